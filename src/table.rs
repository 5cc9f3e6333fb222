use std::io::{self, Write};

use crate::domain::Phenocode;
use crate::error::PhewasError;

pub const PHENOCODE_COLUMN: &str = "phenocode";

/// Header plus the rows a range query returned for one phenotype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    /// Splits tab-delimited lines and checks every row against the header width.
    ///
    /// Blank lines are ignored; `line` in a `SchemaMismatch` is the 1-based
    /// position among the body lines handed in.
    pub fn from_lines<I, S>(
        phenocode: &Phenocode,
        header_line: &str,
        body: I,
    ) -> Result<Self, PhewasError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let header_line = trim_line_end(header_line);
        if header_line.trim().is_empty() {
            return Err(PhewasError::EmptyHeader);
        }
        let header = split_fields(header_line);
        let mut rows = Vec::new();
        for (idx, line) in body.into_iter().enumerate() {
            let line = trim_line_end(line.as_ref());
            if line.is_empty() {
                continue;
            }
            let row = split_fields(line);
            if row.len() != header.len() {
                return Err(PhewasError::SchemaMismatch {
                    phenocode: phenocode.to_string(),
                    line: idx + 1,
                    expected: header.len(),
                    found: row.len(),
                });
            }
            rows.push(row);
        }
        Ok(Self { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// An extracted table with the phenocode prepended to header and rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedTable {
    phenocode: Phenocode,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TaggedTable {
    pub fn phenocode(&self) -> &Phenocode {
        &self.phenocode
    }

    /// Full header, starting with `phenocode`.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Header of the extracted columns only.
    pub fn data_header(&self) -> &[String] {
        &self.header[1..]
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn write_tsv<W: Write>(&self, writer: W) -> io::Result<()> {
        write_tsv(writer, &self.header, &self.rows)
    }
}

/// Prepends `phenocode` as the first column. Consumes the table so a single
/// extraction cannot be tagged twice.
pub fn tag(table: ExtractedTable, phenocode: &Phenocode) -> TaggedTable {
    let code = phenocode.to_string();
    let mut header = Vec::with_capacity(table.header.len() + 1);
    header.push(PHENOCODE_COLUMN.to_string());
    header.extend(table.header);

    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            let mut tagged = Vec::with_capacity(row.len() + 1);
            tagged.push(code.clone());
            tagged.extend(row);
            tagged
        })
        .collect();

    TaggedTable {
        phenocode: phenocode.clone(),
        header,
        rows,
    }
}

/// Final joined table: `phenocode, trait_type, description, <extracted columns>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CombinedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn write_tsv<W: Write>(&self, writer: W) -> io::Result<()> {
        write_tsv(writer, &self.header, &self.rows)
    }
}

fn write_tsv<W: Write>(mut writer: W, header: &[String], rows: &[Vec<String>]) -> io::Result<()> {
    writeln!(writer, "{}", header.join("\t"))?;
    for row in rows {
        writeln!(writer, "{}", row.join("\t"))?;
    }
    writer.flush()
}

fn split_fields(line: &str) -> Vec<String> {
    line.split('\t').map(str::to_string).collect()
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn code(value: &str) -> Phenocode {
        value.parse().unwrap()
    }

    #[test]
    fn from_lines_validates_width() {
        let err = ExtractedTable::from_lines(
            &code("P1"),
            "chr\tpos\tpval\n",
            ["9\t100\t0.5", "9\t101"],
        )
        .unwrap_err();
        assert_matches!(
            err,
            PhewasError::SchemaMismatch {
                line: 2,
                expected: 3,
                found: 2,
                ..
            }
        );
    }

    #[test]
    fn from_lines_skips_blank_lines_and_strips_crlf() {
        let table = ExtractedTable::from_lines(
            &code("P1"),
            "chr\tpos\r\n",
            ["9\t100\r\n", "", "9\t101"],
        )
        .unwrap();
        assert_eq!(table.header(), ["chr", "pos"]);
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0], ["9", "100"]);
    }

    #[test]
    fn from_lines_rejects_empty_header() {
        assert_matches!(
            ExtractedTable::from_lines(&code("P1"), "\n", Vec::<String>::new()),
            Err(PhewasError::EmptyHeader)
        );
    }

    #[test]
    fn tag_prepends_code_everywhere() {
        let table =
            ExtractedTable::from_lines(&code("P1"), "chr\tpos", ["9\t100", "9\t101"]).unwrap();
        let tagged = tag(table, &code("P1"));
        assert_eq!(tagged.header(), ["phenocode", "chr", "pos"]);
        assert_eq!(tagged.data_header(), ["chr", "pos"]);
        assert_eq!(tagged.rows()[1], ["P1", "9", "101"]);
    }

    #[test]
    fn tag_of_empty_table_keeps_header() {
        let table =
            ExtractedTable::from_lines(&code("P2"), "chr\tpos", Vec::<String>::new()).unwrap();
        let tagged = tag(table, &code("P2"));
        assert_eq!(tagged.row_count(), 0);
        let mut out = Vec::new();
        tagged.write_tsv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "phenocode\tchr\tpos\n");
    }
}
