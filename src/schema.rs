use crate::errors::FiscalError;
use crate::parser::RawTable;

pub const DEFAULT_YEAR_COLUMN: &str = "Ano de Exercício";
pub const DEFAULT_REVENUE_COLUMN: &str = "Valor Efetivado Ajustado";
pub const DEFAULT_EXPENSE_COLUMN: &str = "Valor Despesa Empenhada";

/// The source-specific names of the two columns every source must provide.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceSchema {
    pub year_column: String,
    pub value_column: String,
}

impl SourceSchema {
    pub fn new(year_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        Self {
            year_column: year_column.into(),
            value_column: value_column.into(),
        }
    }

    /// The layout of the revenue export.
    pub fn revenue() -> Self {
        Self::new(DEFAULT_YEAR_COLUMN, DEFAULT_REVENUE_COLUMN)
    }

    /// The layout of the expense export.
    pub fn expense() -> Self {
        Self::new(DEFAULT_YEAR_COLUMN, DEFAULT_EXPENSE_COLUMN)
    }

    pub fn required_columns(&self) -> [&str; 2] {
        [self.year_column.as_str(), self.value_column.as_str()]
    }

    /// Confirms the table carries this schema's columns and narrows it to them.
    pub fn validate(&self, table: RawTable) -> Result<RawTable, FiscalError> {
        validate_columns(table, &self.required_columns())
    }
}

/// Returns `table` narrowed to exactly the `required` columns, in the order
/// given, or a [`FiscalError::SchemaMismatch`] naming every absent column.
pub fn validate_columns(table: RawTable, required: &[&str]) -> Result<RawTable, FiscalError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|column| !table.columns.iter().any(|c| c.as_str() == **column))
        .map(|column| column.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(FiscalError::SchemaMismatch {
            source_name: table.source_name,
            missing,
        });
    }

    let RawTable {
        source_name,
        mut rows,
        ..
    } = table;

    for row in rows.iter_mut() {
        row.fields.retain(|column, _| required.contains(&column.as_str()));
    }

    Ok(RawTable {
        source_name,
        columns: required.iter().map(|column| column.to_string()).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LocaleConvention;

    fn table(text: &str) -> RawTable {
        LocaleConvention::default()
            .parse_table("receita.csv", text)
            .unwrap()
    }

    #[test]
    fn should_narrow_table_to_required_columns() {
        let raw = table("Mes;Ano;Orgao;Valor\njan;2014;A;1\n");

        let narrowed = validate_columns(raw, &["Ano", "Valor"]).unwrap();

        assert_eq!(narrowed.columns, vec!["Ano", "Valor"]);
        assert_eq!(narrowed.rows[0].fields.len(), 2);
        assert_eq!(narrowed.rows[0].get("Ano"), Some("2014"));
        assert_eq!(narrowed.rows[0].get("Orgao"), None);
    }

    #[test]
    fn should_fail_naming_every_missing_column() {
        let raw = table("Ano;Outro\n2014;1\n");

        let err = validate_columns(raw, &["Ano", "Valor", "Fonte"]).unwrap_err();

        match err {
            FiscalError::SchemaMismatch {
                source_name,
                missing,
            } => {
                assert_eq!(source_name, "receita.csv");
                assert_eq!(missing, vec!["Valor", "Fonte"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn should_validate_against_the_revenue_layout() {
        let raw = table("Ano de Exercício;Valor Efetivado Ajustado;Categoria\n2014;1;x\n");

        let narrowed = SourceSchema::revenue().validate(raw).unwrap();

        assert_eq!(
            narrowed.columns,
            vec![DEFAULT_YEAR_COLUMN, DEFAULT_REVENUE_COLUMN]
        );
    }

    #[test]
    fn should_reject_the_expense_layout_for_a_revenue_file() {
        let raw = table("Ano de Exercício;Valor Efetivado Ajustado\n2014;1\n");

        let err = SourceSchema::expense().validate(raw).unwrap_err();

        assert!(err.to_string().contains(DEFAULT_EXPENSE_COLUMN));
    }
}
