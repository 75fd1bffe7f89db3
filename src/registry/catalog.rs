//! The closed action vocabulary: one variant per action, each with its
//! parameters, pandas template and executor.

use super::{
    Executor, executors,
    template::{ParamDefault, ParamKind, ParamSpec, Segment, Template},
};

use Segment::{Code, Slot};

/// Every action the registry knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Remove one column.
    DropColumn,
    /// Keep only the listed columns.
    SelectColumns,
    /// Keep rows where a column comparison holds.
    FilterRows,
    /// Stable sort by one column.
    SortValues,
    /// Rename one column.
    RenameColumn,
    /// Drop rows with nulls in any of the listed columns.
    DropNa,
    /// Fill nulls in the listed columns with a literal.
    FillNa,
    /// Cast a column to a primitive type.
    AsType,
    /// Group by key columns and reduce the others.
    GroupByAgg,
    /// Elementwise numeric function into a new column.
    MathTransform,
    /// Ternary map of a comparison into a new column.
    Conditional,
}

impl ActionKind {
    /// All actions, in registration order.
    pub const ALL: [Self; 11] = [
        Self::DropColumn,
        Self::SelectColumns,
        Self::FilterRows,
        Self::SortValues,
        Self::RenameColumn,
        Self::DropNa,
        Self::FillNa,
        Self::AsType,
        Self::GroupByAgg,
        Self::MathTransform,
        Self::Conditional,
    ];

    /// Registered name.
    pub fn name(self) -> &'static str {
        match self {
            Self::DropColumn => "drop_column",
            Self::SelectColumns => "select_columns",
            Self::FilterRows => "filter_rows",
            Self::SortValues => "sort_values",
            Self::RenameColumn => "rename_column",
            Self::DropNa => "drop_na",
            Self::FillNa => "fill_na",
            Self::AsType => "astype",
            Self::GroupByAgg => "groupby_agg",
            Self::MathTransform => "math_transform",
            Self::Conditional => "conditional",
        }
    }

    /// Looks up an action by registered name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Declared parameters.
    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            Self::DropColumn => DROP_COLUMN_PARAMS,
            Self::SelectColumns => SELECT_COLUMNS_PARAMS,
            Self::FilterRows => FILTER_ROWS_PARAMS,
            Self::SortValues => SORT_VALUES_PARAMS,
            Self::RenameColumn => RENAME_COLUMN_PARAMS,
            Self::DropNa => DROP_NA_PARAMS,
            Self::FillNa => FILL_NA_PARAMS,
            Self::AsType => ASTYPE_PARAMS,
            Self::GroupByAgg => GROUPBY_AGG_PARAMS,
            Self::MathTransform => MATH_TRANSFORM_PARAMS,
            Self::Conditional => CONDITIONAL_PARAMS,
        }
    }

    /// pandas statement template.
    pub fn template(self) -> Template {
        Template::new(match self {
            Self::DropColumn => DROP_COLUMN,
            Self::SelectColumns => SELECT_COLUMNS,
            Self::FilterRows => FILTER_ROWS,
            Self::SortValues => SORT_VALUES,
            Self::RenameColumn => RENAME_COLUMN,
            Self::DropNa => DROP_NA,
            Self::FillNa => FILL_NA,
            Self::AsType => ASTYPE,
            Self::GroupByAgg => GROUPBY_AGG,
            Self::MathTransform => MATH_TRANSFORM,
            Self::Conditional => CONDITIONAL,
        })
    }

    /// Validated executor.
    pub fn executor(self) -> Executor {
        match self {
            Self::DropColumn => executors::drop_column,
            Self::SelectColumns => executors::select_columns,
            Self::FilterRows => executors::filter_rows,
            Self::SortValues => executors::sort_values,
            Self::RenameColumn => executors::rename_column,
            Self::DropNa => executors::drop_na,
            Self::FillNa => executors::fill_na,
            Self::AsType => executors::astype,
            Self::GroupByAgg => executors::groupby_agg,
            Self::MathTransform => executors::math_transform,
            Self::Conditional => executors::conditional,
        }
    }

    /// Finds the declared parameter `name`.
    pub fn param(self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|p| p.name == name)
    }
}

const DROP_COLUMN_PARAMS: &[ParamSpec] = &[ParamSpec::required("column", ParamKind::Column)];
const DROP_COLUMN: &[Segment] = &[Code("df = df.drop(columns=["), Slot("column"), Code("])")];

const SELECT_COLUMNS_PARAMS: &[ParamSpec] = &[ParamSpec::required("columns", ParamKind::Columns)];
const SELECT_COLUMNS: &[Segment] = &[Code("df = df["), Slot("columns"), Code("]")];

const FILTER_ROWS_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("column", ParamKind::Column),
    ParamSpec::required("operator", ParamKind::Operator),
    ParamSpec::required("value", ParamKind::Scalar),
];
const FILTER_ROWS: &[Segment] = &[
    Code("df = df[df["),
    Slot("column"),
    Code("] "),
    Slot("operator"),
    Code(" "),
    Slot("value"),
    Code("]"),
];

const SORT_VALUES_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("column", ParamKind::Column),
    ParamSpec::optional("ascending", ParamKind::Flag, ParamDefault::Flag(true)),
];
const SORT_VALUES: &[Segment] = &[
    Code("df = df.sort_values(by="),
    Slot("column"),
    Code(", ascending="),
    Slot("ascending"),
    Code(", kind='stable')"),
];

const RENAME_COLUMN_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("old_name", ParamKind::Column),
    ParamSpec::required("new_name", ParamKind::Column),
];
const RENAME_COLUMN: &[Segment] = &[
    Code("df = df.rename(columns={"),
    Slot("old_name"),
    Code(": "),
    Slot("new_name"),
    Code("})"),
];

const DROP_NA_PARAMS: &[ParamSpec] = &[ParamSpec::required("subset", ParamKind::Columns)];
const DROP_NA: &[Segment] = &[Code("df = df.dropna(subset="), Slot("subset"), Code(")")];

const FILL_NA_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("columns", ParamKind::Columns),
    ParamSpec::required("value", ParamKind::Scalar),
];
const FILL_NA: &[Segment] = &[
    Code("df["),
    Slot("columns"),
    Code("] = df["),
    Slot("columns"),
    Code("].fillna("),
    Slot("value"),
    Code(")"),
];

const ASTYPE_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("column", ParamKind::Column),
    ParamSpec::required("dtype", ParamKind::CastType),
];
const ASTYPE: &[Segment] = &[
    Code("df["),
    Slot("column"),
    Code("] = df["),
    Slot("column"),
    Code("].astype("),
    Slot("dtype"),
    Code(")"),
];

const GROUPBY_AGG_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("group_by", ParamKind::Columns),
    ParamSpec::required("aggregations", ParamKind::Aggregations),
];
const GROUPBY_AGG: &[Segment] = &[
    Code("df = df.groupby("),
    Slot("group_by"),
    Code(", sort=False).agg("),
    Slot("aggregations"),
    Code(").reset_index()"),
];

const MATH_TRANSFORM_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("target_col", ParamKind::Column),
    ParamSpec::required("function", ParamKind::Function),
    ParamSpec::required("new_col_name", ParamKind::Column),
];
const MATH_TRANSFORM: &[Segment] = &[
    Code("df["),
    Slot("new_col_name"),
    Code("] = np."),
    Slot("function"),
    Code("(df["),
    Slot("target_col"),
    Code("])"),
];

const CONDITIONAL_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("column", ParamKind::Column),
    ParamSpec::required("operator", ParamKind::Operator),
    ParamSpec::required("value", ParamKind::Scalar),
    ParamSpec::required("true_val", ParamKind::Scalar),
    ParamSpec::required("false_val", ParamKind::Scalar),
    ParamSpec::required("new_col", ParamKind::Column),
];
const CONDITIONAL: &[Segment] = &[
    Code("df["),
    Slot("new_col"),
    Code("] = np.where(df["),
    Slot("column"),
    Code("] "),
    Slot("operator"),
    Code(" "),
    Slot("value"),
    Code(", "),
    Slot("true_val"),
    Code(", "),
    Slot("false_val"),
    Code(")"),
];
