use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::loader::parse_datetime;
use super::model::{CellValue, Column, ColumnKind, Table};

// ---------------------------------------------------------------------------
// Filter predicate: column / operator / value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Contains,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::Contains,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Contains => "contains",
        }
    }

    fn is_ordering(self) -> bool {
        matches!(self, Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le)
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Operator::Eq => ord == Ordering::Equal,
            Operator::Ne => ord != Ordering::Equal,
            Operator::Gt => ord == Ordering::Greater,
            Operator::Lt => ord == Ordering::Less,
            Operator::Ge => ord != Ordering::Less,
            Operator::Le => ord != Ordering::Greater,
            Operator::Contains => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.symbol() == s.trim())
            .ok_or_else(|| FilterError::UnknownOperator(s.to_string()))
    }
}

/// The comparison operand as entered by the user: a number for numeric
/// columns, free text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Number(n) => write!(f, "{n}"),
            FilterValue::Text(s) => write!(f, "'{s}'"),
        }
    }
}

impl FilterValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            FilterValue::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_text(&self) -> String {
        match self {
            FilterValue::Number(n) => CellValue::Float(*n).to_plain_string(),
            FilterValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("operator {op} cannot be applied to {kind} column '{column}'")]
    IncompatibleOperator {
        column: String,
        kind: ColumnKind,
        op: Operator,
    },
    #[error("value {value} is not comparable with {kind} column '{column}'")]
    InvalidValue {
        column: String,
        kind: ColumnKind,
        value: String,
    },
}

/// A single column / operator / value condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: Operator,
    pub value: FilterValue,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.value)
    }
}

/// The operand after coercion to the column's kind.
enum Operand {
    Number(f64),
    Text(String),
    DateTime(chrono::NaiveDateTime),
    Bool(bool),
    /// Could not be coerced: `==` matches nothing, `!=` everything.
    Unmatched,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: Operator, value: FilterValue) -> Self {
        Predicate {
            column: column.into(),
            op,
            value,
        }
    }

    /// Return indices of rows satisfying the predicate, in table order.
    pub fn evaluate(&self, table: &Table) -> Result<Vec<usize>, FilterError> {
        let column = table
            .column(&self.column)
            .ok_or_else(|| FilterError::UnknownColumn(self.column.clone()))?;

        if self.op == Operator::Contains {
            let needle = self.value.as_text().to_lowercase();
            return Ok(matching(column, |cell| {
                !cell.is_missing() && cell.to_plain_string().to_lowercase().contains(&needle)
            }));
        }

        let operand = self.coerce(column)?;
        let op = self.op;
        Ok(matching(column, |cell| {
            if cell.is_missing() {
                return op == Operator::Ne;
            }
            match compare(cell, &operand) {
                Some(ord) => op.accepts(ord),
                None => op == Operator::Ne,
            }
        }))
    }

    fn coerce(&self, column: &Column) -> Result<Operand, FilterError> {
        let incompatible = || FilterError::IncompatibleOperator {
            column: column.name.clone(),
            kind: column.kind,
            op: self.op,
        };
        let invalid = || FilterError::InvalidValue {
            column: column.name.clone(),
            kind: column.kind,
            value: self.value.to_string(),
        };
        let ordering = self.op.is_ordering();

        let operand = match column.kind {
            ColumnKind::Numeric => match self.value.as_number() {
                Some(n) => Operand::Number(n),
                None if ordering => return Err(invalid()),
                None => Operand::Unmatched,
            },
            ColumnKind::DateTime => match parse_datetime(&self.value.as_text()) {
                Some(d) => Operand::DateTime(d),
                None if ordering => return Err(invalid()),
                None => Operand::Unmatched,
            },
            ColumnKind::Boolean if ordering => return Err(incompatible()),
            ColumnKind::Boolean => match self.value.as_text().trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "1.0" => Operand::Bool(true),
                "false" | "0" | "0.0" => Operand::Bool(false),
                _ => Operand::Unmatched,
            },
            ColumnKind::Text => match &self.value {
                FilterValue::Text(s) => Operand::Text(s.clone()),
                FilterValue::Number(_) if ordering => return Err(incompatible()),
                FilterValue::Number(n) => Operand::Number(*n),
            },
        };
        Ok(operand)
    }
}

fn matching(column: &Column, pred: impl Fn(&CellValue) -> bool) -> Vec<usize> {
    column
        .values
        .iter()
        .enumerate()
        .filter(|(_, cell)| pred(cell))
        .map(|(i, _)| i)
        .collect()
}

/// Compare a cell with the operand; `None` when the two are of different
/// types (never equal, never ordered).
fn compare(cell: &CellValue, operand: &Operand) -> Option<Ordering> {
    match (cell, operand) {
        (CellValue::Integer(_) | CellValue::Float(_), Operand::Number(n)) => {
            cell.as_f64().and_then(|v| v.partial_cmp(n))
        }
        (CellValue::Text(s), Operand::Text(t)) => Some(s.as_str().cmp(t.as_str())),
        (CellValue::DateTime(d), Operand::DateTime(e)) => Some(d.cmp(e)),
        (CellValue::Bool(b), Operand::Bool(c)) => Some(b.cmp(c)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Best-effort application
// ---------------------------------------------------------------------------

/// Apply one predicate. Filtering never fails the caller: on any error the
/// input table is returned unchanged.
pub fn apply_filter(table: &Table, predicate: &Predicate) -> Table {
    match predicate.evaluate(table) {
        Ok(indices) => {
            log::debug!(
                "filter `{predicate}` kept {} of {} rows",
                indices.len(),
                table.n_rows()
            );
            table.take_rows(&indices)
        }
        Err(e) => {
            log::warn!("filter `{predicate}` ignored: {e}");
            table.clone()
        }
    }
}

/// Apply predicates one after the other, each narrowing the previous
/// result (logical AND).
pub fn apply_filters(table: &Table, predicates: &[Predicate]) -> Table {
    predicates
        .iter()
        .fold(table.clone(), |acc, p| apply_filter(&acc, p))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;

    fn people() -> Table {
        Table::new(vec![
            Column::new(
                "name",
                ["Asha", "bob", "Chen", "Dara", "Eli"]
                    .iter()
                    .map(|s| CellValue::Text(s.to_string()))
                    .collect(),
            ),
            Column::new(
                "age",
                vec![
                    CellValue::Integer(31),
                    CellValue::Integer(45),
                    CellValue::Null,
                    CellValue::Integer(22),
                    CellValue::Integer(45),
                ],
            ),
            Column::new(
                "member",
                vec![
                    CellValue::Bool(true),
                    CellValue::Bool(false),
                    CellValue::Bool(true),
                    CellValue::Null,
                    CellValue::Bool(false),
                ],
            ),
        ])
    }

    fn names(t: &Table) -> Vec<String> {
        t.column("name")
            .unwrap()
            .values
            .iter()
            .map(|v| v.to_plain_string())
            .collect()
    }

    #[test]
    fn parses_operator_symbols() {
        assert_eq!(">=".parse::<Operator>().unwrap(), Operator::Ge);
        assert_eq!("contains".parse::<Operator>().unwrap(), Operator::Contains);
        assert!("=~".parse::<Operator>().is_err());
        for op in Operator::ALL {
            assert_eq!(op.to_string().parse::<Operator>().unwrap(), op);
        }
    }

    #[test]
    fn numeric_comparisons_skip_missing_cells() {
        let t = people();
        let p = Predicate::new("age", Operator::Ge, FilterValue::Number(31.0));
        assert_eq!(names(&apply_filter(&t, &p)), vec!["Asha", "bob", "Eli"]);

        let p = Predicate::new("age", Operator::Ne, FilterValue::Number(45.0));
        assert_eq!(names(&apply_filter(&t, &p)), vec!["Asha", "Chen", "Dara"]);
    }

    #[test]
    fn contains_is_case_insensitive_on_any_column() {
        let t = people();
        let p = Predicate::new("name", Operator::Contains, FilterValue::Text("B".into()));
        assert_eq!(names(&apply_filter(&t, &p)), vec!["bob"]);

        let p = Predicate::new("age", Operator::Contains, FilterValue::Text("4".into()));
        assert_eq!(names(&apply_filter(&t, &p)), vec!["bob", "Eli"]);

        let p = Predicate::new("member", Operator::Contains, FilterValue::Text("TRU".into()));
        assert_eq!(names(&apply_filter(&t, &p)), vec!["Asha", "Chen"]);
    }

    #[test]
    fn incompatible_predicates_return_the_input_unchanged() {
        let t = people();
        let cases = [
            Predicate::new("age", Operator::Gt, FilterValue::Text("old".into())),
            Predicate::new("member", Operator::Lt, FilterValue::Text("true".into())),
            Predicate::new("name", Operator::Gt, FilterValue::Number(3.0)),
            Predicate::new("missing", Operator::Eq, FilterValue::Number(1.0)),
        ];
        for p in &cases {
            assert!(p.evaluate(&t).is_err(), "{p} should be rejected");
            assert_eq!(apply_filter(&t, p), t);
        }
    }

    #[test]
    fn unparsable_equality_matches_nothing() {
        let t = people();
        let p = Predicate::new("age", Operator::Eq, FilterValue::Text("old".into()));
        assert_eq!(apply_filter(&t, &p).n_rows(), 0);
        let p = Predicate::new("age", Operator::Ne, FilterValue::Text("old".into()));
        assert_eq!(apply_filter(&t, &p).n_rows(), 5);
    }

    #[test]
    fn text_and_bool_equality() {
        let t = people();
        let p = Predicate::new("name", Operator::Eq, FilterValue::Text("Dara".into()));
        assert_eq!(names(&apply_filter(&t, &p)), vec!["Dara"]);
        let p = Predicate::new("member", Operator::Eq, FilterValue::Text("True".into()));
        assert_eq!(names(&apply_filter(&t, &p)), vec!["Asha", "Chen"]);
    }

    #[test]
    fn datetime_ordering_parses_the_operand() {
        let day = |d| {
            CellValue::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            )
        };
        let t = Table::new(vec![Column::new("when", vec![day(1), day(5), day(9)])]);
        let p = Predicate::new("when", Operator::Gt, FilterValue::Text("2024-01-04".into()));
        assert_eq!(apply_filter(&t, &p).n_rows(), 2);
    }

    #[test]
    fn two_filters_narrow_sequentially() {
        let t = people();
        let filters = [
            Predicate::new("age", Operator::Gt, FilterValue::Number(25.0)),
            Predicate::new("member", Operator::Eq, FilterValue::Text("false".into())),
        ];
        assert_eq!(names(&apply_filters(&t, &filters)), vec!["bob", "Eli"]);
    }

    fn arb_table() -> impl Strategy<Value = Table> {
        prop::collection::vec((prop::option::of(-50i64..50), "[a-c]{0,3}"), 0..40).prop_map(
            |rows| {
                let (nums, texts): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
                Table::new(vec![
                    Column::new(
                        "n",
                        nums.into_iter()
                            .map(|v| v.map_or(CellValue::Null, CellValue::Integer))
                            .collect(),
                    ),
                    Column::new("s", texts.into_iter().map(CellValue::Text).collect()),
                ])
            },
        )
    }

    fn arb_predicate() -> impl Strategy<Value = Predicate> {
        prop_oneof![
            (prop::sample::select(Operator::ALL.to_vec()), -50i64..50)
                .prop_map(|(op, v)| Predicate::new("n", op, FilterValue::Number(v as f64))),
            (
                prop::sample::select(vec![Operator::Eq, Operator::Ne, Operator::Contains, Operator::Lt]),
                "[a-c]{0,2}"
            )
                .prop_map(|(op, v)| Predicate::new("s", op, FilterValue::Text(v))),
        ]
    }

    /// Reference check of a single row, written independently of `evaluate`.
    fn row_satisfies(t: &Table, row: usize, p: &Predicate) -> bool {
        let cell = &t.column(&p.column).unwrap().values[row];
        match (cell, &p.value) {
            (CellValue::Null, _) => p.op == Operator::Ne,
            (CellValue::Integer(i), FilterValue::Number(v)) => {
                let i = *i as f64;
                match p.op {
                    Operator::Eq => i == *v,
                    Operator::Ne => i != *v,
                    Operator::Gt => i > *v,
                    Operator::Lt => i < *v,
                    Operator::Ge => i >= *v,
                    Operator::Le => i <= *v,
                    Operator::Contains => cell.to_plain_string().contains(&p.value.as_text()),
                }
            }
            (CellValue::Text(s), FilterValue::Text(v)) => match p.op {
                Operator::Eq => s == v,
                Operator::Ne => s != v,
                Operator::Lt => s < v,
                Operator::Contains => s.to_lowercase().contains(&v.to_lowercase()),
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    proptest! {
        /// Property: the result holds exactly the satisfying rows, in order.
        #[test]
        fn prop_filter_returns_exactly_satisfying_rows(t in arb_table(), p in arb_predicate()) {
            let expected: Vec<usize> = (0..t.n_rows()).filter(|&r| row_satisfies(&t, r, &p)).collect();
            prop_assert_eq!(apply_filter(&t, &p), t.take_rows(&expected));
        }

        /// Property: two filters act as AND, independent of their order.
        #[test]
        fn prop_filters_compose_as_and(t in arb_table(), p1 in arb_predicate(), p2 in arb_predicate()) {
            let both: Vec<usize> = (0..t.n_rows())
                .filter(|&r| row_satisfies(&t, r, &p1) && row_satisfies(&t, r, &p2))
                .collect();
            let expected = t.take_rows(&both);
            prop_assert_eq!(&apply_filters(&t, &[p1.clone(), p2.clone()]), &expected);
            prop_assert_eq!(&apply_filters(&t, &[p2, p1]), &expected);
        }
    }
}
