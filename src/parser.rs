use crate::errors::{FiscalError, ParseWarning};
use csv::Trim;
use encoding_rs::{Encoding, WINDOWS_1252};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// One line of a source file, keyed by column name. Values are the raw,
/// trimmed text of each field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRow {
    /// The 1-based line number of the row in its source file.
    pub line: u64,
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// A parsed but untyped source table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Display name of the source, used in errors and warnings.
    pub source_name: String,

    /// Column names in header order.
    pub columns: Vec<String>,

    pub rows: Vec<RawRow>,
}

/// A (year, value) pair projected out of one source row. The value is `None`
/// when the cell failed numeric coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceRecord {
    pub year: i32,
    pub value: Option<Decimal>,
}

/// A row of the revenue source after coercion.
pub type RevenueRecord = SourceRecord;

/// A row of the expense source after coercion.
pub type ExpenseRecord = SourceRecord;

/// The numeric and text conventions a source file is written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocaleConvention {
    pub decimal_separator: char,
    pub grouping_separator: char,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for LocaleConvention {
    /// Decimal comma, thousands dot, `;` delimited, latin-1 family encoding.
    fn default() -> Self {
        Self {
            decimal_separator: ',',
            grouping_separator: '.',
            delimiter: b';',
            encoding: WINDOWS_1252,
        }
    }
}

impl LocaleConvention {
    /// Returns a copy of this convention reading text in the encoding named
    /// by a WHATWG label such as `latin1`, `windows-1252` or `utf-8`.
    pub fn with_encoding_label(self, label: &str) -> Result<Self, FiscalError> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| FiscalError::UnknownEncoding(label.to_string()))?;

        Ok(Self { encoding, ..self })
    }

    /// Parses a locale formatted number such as `-1.234.567,89`. Grouping
    /// separators are stripped before the decimal separator is interpreted.
    /// Only digits, one leading sign, grouping separators and a single
    /// decimal separator are accepted. Empty or malformed text yields `None`.
    pub fn parse_decimal(&self, raw: &str) -> Option<Decimal> {
        let raw = raw.trim();
        let unsigned = raw.strip_prefix(['-', '+']).unwrap_or(raw);

        let mut normalized = String::with_capacity(raw.len());
        if raw.starts_with('-') {
            normalized.push('-');
        }

        let mut digits = 0;
        let mut seen_decimal = false;
        for c in unsigned.chars() {
            if c.is_ascii_digit() {
                digits += 1;
                normalized.push(c);
            } else if c == self.decimal_separator && !seen_decimal {
                seen_decimal = true;
                normalized.push('.');
            } else if c != self.grouping_separator {
                return None;
            }
        }

        if digits == 0 {
            return None;
        }

        Decimal::from_str(&normalized).ok()
    }

    /// Parses a fiscal year cell. Years follow the same numeric convention as
    /// values but must be integral.
    pub fn parse_year(&self, raw: &str) -> Option<i32> {
        let value = self.parse_decimal(raw)?;
        if !value.fract().is_zero() {
            return None;
        }

        value.to_i32()
    }

    /// Reads and decodes the file at `path`, then splits it into raw rows.
    pub fn read_table(&self, path: &Path) -> Result<RawTable, FiscalError> {
        let mut file = File::open(path).map_err(|_| FiscalError::SourceNotFound {
            path: path.to_path_buf(),
        })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let text = self.decode(&bytes).ok_or_else(|| FiscalError::DecodeError {
            path: path.to_path_buf(),
            encoding: self.encoding.name().to_string(),
        })?;

        self.parse_table(&source_name(path), &text)
    }

    /// Decodes raw bytes under the declared encoding. A byte order mark, when
    /// present, takes precedence over the declared encoding. Returns `None` if
    /// the bytes are malformed for the encoding in use.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        let (encoding, bom_length) = Encoding::for_bom(bytes).unwrap_or((self.encoding, 0));

        encoding
            .decode_without_bom_handling_and_without_replacement(&bytes[bom_length..])
            .map(|text| text.into_owned())
    }

    /// Splits decoded text into a header and raw rows. Short rows are kept;
    /// their missing fields are simply absent from the row. A repeated header
    /// name keeps its first column; later ones are renamed `Name.1`,
    /// `Name.2` and so on.
    pub fn parse_table(&self, source_name: &str, text: &str) -> Result<RawTable, FiscalError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let columns = dedupe_columns(reader.headers()?.iter());
        let lines = LineIndex::new(text);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record
                .position()
                .map(|p| lines.line_of(p.byte() as usize))
                .unwrap_or_default();

            let fields = columns
                .iter()
                .zip(record.iter())
                .map(|(column, value)| (column.clone(), value.to_string()))
                .collect();

            rows.push(RawRow { line, fields });
        }

        debug!(source = source_name, rows = rows.len(), "parsed source table");

        Ok(RawTable {
            source_name: source_name.to_string(),
            columns,
            rows,
        })
    }

    /// Coerces a validated table into (year, value) records.
    ///
    /// A value cell that fails to parse becomes `None` and is reported as a
    /// [`ParseWarning`]. A year cell that fails to parse is fatal, since the
    /// year is the join key and cannot be defaulted.
    pub fn coerce_records(
        &self,
        table: &RawTable,
        year_column: &str,
        value_column: &str,
    ) -> Result<(Vec<SourceRecord>, Vec<ParseWarning>), FiscalError> {
        let mut records = Vec::with_capacity(table.rows.len());
        let mut warnings = Vec::new();

        for row in &table.rows {
            let raw_year = row.get(year_column).unwrap_or_default();
            let year = self
                .parse_year(raw_year)
                .ok_or_else(|| FiscalError::InvalidYear {
                    source_name: table.source_name.clone(),
                    line: row.line,
                    raw: raw_year.to_string(),
                })?;

            let raw_value = row.get(value_column).unwrap_or_default();
            let value = self.parse_decimal(raw_value);
            if value.is_none() {
                let warning = ParseWarning {
                    source_name: table.source_name.clone(),
                    line: row.line,
                    column: value_column.to_string(),
                    raw: raw_value.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }

            records.push(SourceRecord { year, value });
        }

        Ok((records, warnings))
    }
}

/// Renames repeated header names so every column keeps a distinct key.
fn dedupe_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();

    for header in headers {
        let mut name = header.to_string();
        let mut suffix = 0;
        while columns.contains(&name) {
            suffix += 1;
            name = format!("{}.{}", header, suffix);
        }
        columns.push(name);
    }

    columns
}

/// Maps byte offsets of decoded text to 1-based line numbers.
struct LineIndex<'a> {
    text: &'a [u8],
    newlines: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.as_bytes();
        let newlines = text
            .iter()
            .enumerate()
            .filter(|(_, byte)| **byte == b'\n')
            .map(|(i, _)| i)
            .collect();

        Self { text, newlines }
    }

    /// The line holding the first character at or after `offset`. With CRLF
    /// endings the csv reader reports a record as starting on the `\n` of
    /// the previous line, so line terminators are skipped first.
    fn line_of(&self, offset: usize) -> u64 {
        let skipped = self
            .text
            .get(offset..)
            .unwrap_or_default()
            .iter()
            .take_while(|byte| matches!(**byte, b'\r' | b'\n'))
            .count();
        let start = offset + skipped;

        (self.newlines.partition_point(|&newline| newline < start) + 1) as u64
    }
}

/// The name a source is reported under: its file name, or the full path when
/// it has none.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[rstest]
    #[case("1.234.567,89", Some(dec!(1234567.89)))]
    #[case("100", Some(dec!(100)))]
    #[case("-2.500,5", Some(dec!(-2500.5)))]
    #[case("  42,00 ", Some(dec!(42.00)))]
    #[case("0,01", Some(dec!(0.01)))]
    #[case("", None)]
    #[case("   ", None)]
    #[case("abc", None)]
    #[case("12,3,4", None)]
    #[case("R$ 10,00", None)]
    #[case("1_000", None)]
    #[case("1_0_0,5", None)]
    #[case("1e3", None)]
    #[case("--5", None)]
    #[case("-", None)]
    #[case("+7,5", Some(dec!(7.5)))]
    fn should_parse_locale_decimals(#[case] raw: &str, #[case] expected: Option<Decimal>) {
        assert_eq!(LocaleConvention::default().parse_decimal(raw), expected);
    }

    #[rstest]
    #[case("2014", Some(2014))]
    #[case(" 2.024 ", Some(2024))]
    #[case("2014,0", Some(2014))]
    #[case("2014,5", None)]
    #[case("", None)]
    #[case("ano", None)]
    fn should_parse_years(#[case] raw: &str, #[case] expected: Option<i32>) {
        assert_eq!(LocaleConvention::default().parse_year(raw), expected);
    }

    #[test]
    fn should_parse_table_into_rows_keyed_by_column() {
        let convention = LocaleConvention::default();
        let text = "Ano;Valor;Extra\n2014; 1.000,50 ;x\n2015;2.000\n";

        let table = convention.parse_table("receita.csv", text).unwrap();

        assert_eq!(table.columns, vec!["Ano", "Valor", "Extra"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("Valor"), Some("1.000,50"));
        assert_eq!(table.rows[0].line, 2);

        // The second row is short, so its missing field is absent.
        assert_eq!(table.rows[1].get("Extra"), None);
    }

    #[test]
    fn should_coerce_bad_values_to_null_with_a_warning() {
        let convention = LocaleConvention::default();
        let table = convention
            .parse_table("receita.csv", "Ano;Valor\n2014;100\n2015;n/d\n2016;\n")
            .unwrap();

        let (records, warnings) = convention.coerce_records(&table, "Ano", "Valor").unwrap();

        assert_eq!(
            records,
            vec![
                SourceRecord {
                    year: 2014,
                    value: Some(dec!(100))
                },
                SourceRecord {
                    year: 2015,
                    value: None
                },
                SourceRecord {
                    year: 2016,
                    value: None
                },
            ]
        );
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].line, 3);
        assert_eq!(warnings[0].raw, "n/d");
        assert_eq!(warnings[1].raw, "");
    }

    #[rstest]
    #[case("\n")]
    #[case("\r\n")]
    fn should_number_lines_independently_of_line_endings(#[case] ending: &str) {
        let convention = LocaleConvention::default();
        let text = ["Ano;Valor", "2014;1", "2015;x", "2016;y", ""].join(ending);

        let table = convention.parse_table("receita.csv", &text).unwrap();
        let (_, warnings) = convention.coerce_records(&table, "Ano", "Valor").unwrap();

        let lines: Vec<u64> = table.rows.iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        let warning_lines: Vec<u64> = warnings.iter().map(|w| w.line).collect();
        assert_eq!(warning_lines, vec![3, 4]);
    }

    #[test]
    fn should_keep_the_first_of_repeated_columns() {
        let convention = LocaleConvention::default();
        let text = "Ano;Valor;Valor;Valor\r\n2014;1;2;3\r\n";

        let table = convention.parse_table("despesa.csv", text).unwrap();

        assert_eq!(table.columns, vec!["Ano", "Valor", "Valor.1", "Valor.2"]);
        assert_eq!(table.rows[0].get("Valor"), Some("1"));
        assert_eq!(table.rows[0].get("Valor.1"), Some("2"));
    }

    #[test]
    fn should_fail_to_coerce_an_invalid_year() {
        let convention = LocaleConvention::default();
        let table = convention
            .parse_table("despesa.csv", "Ano;Valor\ntotal;100\n")
            .unwrap();

        let err = convention
            .coerce_records(&table, "Ano", "Valor")
            .unwrap_err();

        assert!(matches!(
            err,
            FiscalError::InvalidYear { line: 2, ref raw, .. } if raw == "total"
        ));
    }

    #[test]
    fn should_decode_latin1_headers() {
        // "Ano de Exercício" with the accented i encoded as a single latin-1 byte.
        let bytes = b"Ano de Exerc\xedcio;Valor\n2014;1\n";
        let text = LocaleConvention::default().decode(bytes).unwrap();

        assert!(text.starts_with("Ano de Exercício;"));
    }

    #[test]
    fn should_fail_to_decode_malformed_utf8() {
        let convention = LocaleConvention::default()
            .with_encoding_label("utf-8")
            .unwrap();

        assert_eq!(convention.decode(b"Ano;Valor\n\xff\xfe\xfd;1\n"), None);
    }

    #[test]
    fn should_reject_unknown_encoding_labels() {
        let err = LocaleConvention::default()
            .with_encoding_label("klingon")
            .unwrap_err();

        assert_eq!(err.to_string(), "unknown text encoding label: klingon");
    }

    #[test]
    fn should_report_missing_files_as_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receita.csv");

        let err = LocaleConvention::default().read_table(&path).unwrap_err();

        assert!(matches!(err, FiscalError::SourceNotFound { path: ref p } if p == &path));
    }

    #[test]
    fn should_report_undecodable_files_as_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("despesa.csv");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"Ano;Valor\n2014;\xc3\x28\n").unwrap();

        let convention = LocaleConvention::default()
            .with_encoding_label("utf-8")
            .unwrap();
        let err = convention.read_table(&path).unwrap_err();

        assert!(matches!(err, FiscalError::DecodeError { ref encoding, .. } if encoding == "UTF-8"));
    }
}
