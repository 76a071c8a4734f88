//! The tool catalogue.
//!
//! Each entry declares its parameters, upstream API, and report layout.
//! Texts are user-facing and stay in Chinese.

use super::report::{ArgLabel, Body, Conditions, Line, LookupKey, ReportTemplate};
use super::{Endpoint, ParamSpec, QueryTool, SourceChoice};

const DATA_SOURCE: &str = "data_source";
const DATA_SOURCE_DESCRIPTION: &str = "数据源选择：dongcai（东财）或 tonghuashun（同花顺）";

const TRADE_DATE: ParamSpec = ParamSpec::new("trade_date", "交易日期（YYYYMMDD格式，如 20231201）");
const START_DATE: ParamSpec = ParamSpec::new("start_date", "开始日期（YYYYMMDD格式）");
const END_DATE: ParamSpec = ParamSpec::new("end_date", "结束日期（YYYYMMDD格式）");

const HINT_TOKEN: &str = "Tushare Token 是否正确配置";
const HINT_DATE: &str = "日期格式是否正确（YYYYMMDD）";
const HINT_PERMISSION: &str = "是否有该接口的访问权限";
const HINT_PERMISSION_6000: &str = "是否有该接口的访问权限（需6000积分）";

const MEMBER_COUNT: LookupKey = LookupKey {
    arg: "block_code",
    label: "板块代码",
    count_label: "成分股数量",
};
const ALL_MEMBERS: (&str, &str) = ("查询全部板块成分", "数据量");

const THS_INDEX_LINES: &[Line] = &[
    Line::new("代码", "{ts_code}"),
    Line::new("名称", "{name}"),
    Line::new("成分个数", "{count}"),
    Line::new("交易所", "{exchange}"),
    Line::new("上市日期", "{list_date}"),
    Line::new("类型", "{type}"),
];

const THS_MEMBER_LINES: &[Line] = &[
    Line::new("指数代码", "{ts_code}"),
    Line::new("成分代码", "{con_code}"),
    Line::new("成分名称", "{con_name}"),
    Line::optional("权重", "{weight}"),
    Line::optional("纳入日期", "{in_date}"),
    Line::optional("是否最新", "{is_new}"),
];

const DC_INDEX_LINES: &[Line] = &[
    Line::new("涨跌幅", "{pct_change}%"),
    Line::new("领涨股", "{leading} ({leading_code})"),
    Line::new("领涨股涨跌幅", "{leading_pct}%"),
    Line::new("总市值", "{total_mv}万元"),
    Line::new("换手率", "{turnover_rate}%"),
    Line::new("上涨家数", "{up_num}"),
    Line::new("下降家数", "{down_num}"),
];

const DC_MEMBER_LINES: &[Line] = &[
    Line::new("交易日期", "{trade_date}"),
    Line::new("板块代码", "{ts_code}"),
    Line::new("成分代码", "{con_code}"),
    Line::new("成分名称", "{name}"),
];

/// Every tool, in `tools/list` order.
pub static TOOLS: &[QueryTool] = &[
    QueryTool {
        name: "get_stock_moneyflow",
        description: "获取个股资金流向数据。支持选择东财（DongCai）或同花顺（TongHuaShun）数据源。",
        params: &[
            ParamSpec::new("ts_code", "股票代码（如 000001.SZ 或 600000.SH）"),
            ParamSpec::new(
                "trade_date",
                "交易日期（格式：YYYYMMDD，如 20231201），不传则返回最近数据",
            ),
            ParamSpec::new("start_date", "开始日期（格式：YYYYMMDD）"),
            ParamSpec::new("end_date", "结束日期（格式：YYYYMMDD）"),
        ],
        endpoint: Endpoint::BySource {
            param: DATA_SOURCE,
            description: DATA_SOURCE_DESCRIPTION,
            choices: &[
                SourceChoice {
                    value: "dongcai",
                    label: "东财",
                    api_name: "moneyflow_dc",
                },
                SourceChoice {
                    value: "tonghuashun",
                    label: "同花顺",
                    api_name: "moneyflow_hsgt",
                },
            ],
        },
        display_cap: 20,
        report: ReportTemplate {
            title: "个股资金流向查询结果",
            conditions: Conditions::Query {
                subject: &["ts_code"],
                fallback: "全市场",
                notes: &[],
            },
            heading: "{ts_code|name}",
            body: Body::AllFields,
        },
        hints: &[
            HINT_TOKEN,
            "股票代码格式是否正确（如 000001.SZ）",
            HINT_DATE,
            HINT_PERMISSION,
        ],
    },
    QueryTool {
        name: "get_block_moneyflow",
        description: "获取板块资金流向数据。支持选择东财（DongCai）或同花顺（TongHuaShun）数据源。",
        params: &[
            ParamSpec::new("block_code", "板块代码（如 BK0001）"),
            ParamSpec::new("trade_date", "交易日期（格式：YYYYMMDD，如 20231201）"),
            ParamSpec::new("start_date", "开始日期（格式：YYYYMMDD）"),
            ParamSpec::new("end_date", "结束日期（格式：YYYYMMDD）"),
        ],
        endpoint: Endpoint::BySource {
            param: DATA_SOURCE,
            description: DATA_SOURCE_DESCRIPTION,
            choices: &[
                SourceChoice {
                    value: "dongcai",
                    label: "东财",
                    api_name: "dc_bk_moneyflow",
                },
                SourceChoice {
                    value: "tonghuashun",
                    label: "同花顺",
                    api_name: "ths_bk_moneyflow",
                },
            ],
        },
        display_cap: 20,
        report: ReportTemplate {
            title: "板块资金流向查询结果",
            conditions: Conditions::Query {
                subject: &["block_code"],
                fallback: "全部板块",
                notes: &[],
            },
            heading: "{name|block_code}",
            body: Body::AllFields,
        },
        hints: &[HINT_TOKEN, "板块代码格式是否正确", HINT_DATE, HINT_PERMISSION],
    },
    QueryTool {
        name: "get_block_member",
        description: "获取板块成分股数据。支持选择东财（DongCai）或同花顺（TongHuaShun）数据源。",
        params: &[
            ParamSpec::new("ts_code", "股票代码（如 000001.SZ 或 600000.SH）"),
            ParamSpec::new("block_code", "板块代码（如 BK0001）"),
        ],
        endpoint: Endpoint::BySource {
            param: DATA_SOURCE,
            description: DATA_SOURCE_DESCRIPTION,
            choices: &[
                SourceChoice {
                    value: "dongcai",
                    label: "东财",
                    api_name: "dc_bk_member",
                },
                SourceChoice {
                    value: "tonghuashun",
                    label: "同花顺",
                    api_name: "ths_bk_member",
                },
            ],
        },
        display_cap: 50,
        report: ReportTemplate {
            title: "板块成分查询结果",
            conditions: Conditions::Lookup {
                keys: &[
                    MEMBER_COUNT,
                    LookupKey {
                        arg: "ts_code",
                        label: "股票代码",
                        count_label: "所属板块数量",
                    },
                ],
                otherwise: ALL_MEMBERS,
            },
            heading: "{name|ts_code|block_code}",
            body: Body::AllFields,
        },
        hints: &[HINT_TOKEN, "股票代码或板块代码格式是否正确", HINT_PERMISSION],
    },
    QueryTool {
        name: "get_ths_index",
        description: "获取同花顺概念和行业指数列表。可查询指数代码、市场类型、指数类型等信息。",
        params: &[
            ParamSpec::new("ts_code", "指数代码（如 885823.TI）"),
            ParamSpec::new("exchange", "市场类型：A-A股 HK-港股 US-美股"),
            ParamSpec::new(
                "type",
                "指数类型：N-概念指数 I-行业指数 R-地域指数 S-同花顺特色指数 ST-同花顺风格指数 TH-同花顺主题指数 BB-同花顺宽基指数",
            ),
        ],
        endpoint: Endpoint::Fixed("ths_index"),
        display_cap: 50,
        report: ReportTemplate {
            title: "同花顺概念和行业指数查询结果",
            conditions: Conditions::Plain,
            heading: "{name} ({ts_code})",
            body: Body::Lines(THS_INDEX_LINES),
        },
        hints: &[HINT_TOKEN, HINT_PERMISSION_6000],
    },
    QueryTool {
        name: "get_ths_daily",
        description: "获取同花顺板块指数行情数据。包含开盘价、收盘价、涨跌幅、成交量等信息。",
        params: &[
            ParamSpec::new("ts_code", "指数代码（如 885823.TI）"),
            TRADE_DATE,
            START_DATE,
            END_DATE,
        ],
        endpoint: Endpoint::Fixed("ths_daily"),
        display_cap: 20,
        report: ReportTemplate {
            title: "同花顺板块指数行情查询结果",
            conditions: Conditions::Query {
                subject: &["ts_code"],
                fallback: "全部",
                notes: &[],
            },
            heading: "{ts_code} ({trade_date})",
            body: Body::AllFields,
        },
        hints: &[HINT_TOKEN, HINT_DATE, HINT_PERMISSION_6000],
    },
    QueryTool {
        name: "get_ths_member",
        description: "获取同花顺概念板块成分股列表。可查询指定板块的成分股，或查询指定股票所属的板块。",
        params: &[
            ParamSpec::new("ts_code", "板块指数代码（如 885823.TI），查询该板块包含的成分股"),
            ParamSpec::new("con_code", "股票代码（如 000001.SZ），查询该股票所属的板块"),
        ],
        endpoint: Endpoint::Fixed("ths_member"),
        display_cap: 50,
        report: ReportTemplate {
            title: "同花顺概念板块成分查询结果",
            conditions: Conditions::Lookup {
                keys: &[
                    LookupKey {
                        arg: "ts_code",
                        label: "板块代码",
                        count_label: "成分股数量",
                    },
                    LookupKey {
                        arg: "con_code",
                        label: "股票代码",
                        count_label: "所属板块数量",
                    },
                ],
                otherwise: ALL_MEMBERS,
            },
            heading: "{con_name} ({con_code})",
            body: Body::Lines(THS_MEMBER_LINES),
        },
        hints: &[
            HINT_TOKEN,
            "板块代码或股票代码格式是否正确",
            "是否有该接口的访问权限（需5000积分）",
        ],
    },
    QueryTool {
        name: "get_dc_index",
        description: "获取东方财富概念板块信息。包含板块涨跌幅、领涨股、总市值、换手率等数据。",
        params: &[
            ParamSpec::new("ts_code", "指数代码（支持多个代码同时输入，用逗号分隔）"),
            ParamSpec::new("name", "板块名称（例如：人形机器人）"),
            TRADE_DATE,
            START_DATE,
            END_DATE,
        ],
        endpoint: Endpoint::Fixed("dc_index"),
        display_cap: 20,
        report: ReportTemplate {
            title: "东方财富概念板块信息查询结果",
            conditions: Conditions::Query {
                subject: &["ts_code", "name"],
                fallback: "全部",
                notes: &[],
            },
            heading: "{name} ({ts_code}) - {trade_date}",
            body: Body::Lines(DC_INDEX_LINES),
        },
        hints: &[HINT_TOKEN, HINT_DATE, HINT_PERMISSION_6000],
    },
    QueryTool {
        name: "get_dc_daily",
        description: "获取东方财富板块行情数据。包含开盘价、收盘价、涨跌幅、成交量等信息。支持概念板块、行业板块、地域板块。",
        params: &[
            ParamSpec::new("ts_code", "板块代码（格式：xxxxx.DC）"),
            TRADE_DATE,
            START_DATE,
            END_DATE,
            ParamSpec::new("idx_type", "板块类型：概念板块、行业板块、地域板块"),
        ],
        endpoint: Endpoint::Fixed("dc_daily"),
        display_cap: 20,
        report: ReportTemplate {
            title: "东方财富板块行情查询结果",
            conditions: Conditions::Query {
                subject: &["ts_code"],
                fallback: "全部",
                notes: &[ArgLabel {
                    arg: "idx_type",
                    label: "板块类型",
                }],
            },
            heading: "{ts_code} ({trade_date})",
            body: Body::AllFields,
        },
        hints: &[
            HINT_TOKEN,
            "板块代码格式是否正确（xxxxx.DC）",
            HINT_DATE,
            HINT_PERMISSION_6000,
        ],
    },
    QueryTool {
        name: "get_dc_member",
        description: "获取东方财富板块成分股数据。可查询指定板块的成分股，或查询指定股票所属的板块。支持历史成分查询。",
        params: &[
            ParamSpec::new("ts_code", "板块指数代码，查询该板块包含的成分股"),
            ParamSpec::new("con_code", "成分股票代码，查询该股票所属的板块"),
            ParamSpec::new("trade_date", "交易日期（YYYYMMDD格式），查询指定日期的成分"),
        ],
        endpoint: Endpoint::Fixed("dc_member"),
        display_cap: 50,
        report: ReportTemplate {
            title: "东方财富板块成分查询结果",
            conditions: Conditions::Echo {
                args: &[
                    ArgLabel {
                        arg: "ts_code",
                        label: "板块代码",
                    },
                    ArgLabel {
                        arg: "con_code",
                        label: "股票代码",
                    },
                    ArgLabel {
                        arg: "trade_date",
                        label: "交易日期",
                    },
                ],
                count_label: "数据数量",
            },
            heading: "{name} ({con_code})",
            body: Body::Lines(DC_MEMBER_LINES),
        },
        hints: &[
            HINT_TOKEN,
            "板块代码或股票代码格式是否正确",
            HINT_DATE,
            HINT_PERMISSION_6000,
        ],
    },
];
