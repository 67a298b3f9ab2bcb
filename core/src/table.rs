use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A named-column, string-celled tabular dataset, the in-memory form of one
/// sheet. The first CSV row is the header; every data row has one cell per
/// column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    #[must_use]
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!(
                "Row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn retain_rows<F: FnMut(&[String]) -> bool>(&mut self, mut keep: F) {
        self.rows.retain(|r| keep(r));
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = rdr
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(ToString::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record =
                result.with_context(|| format!("Failed to parse CSV row {}", line + 2))?;
            let mut row: Vec<String> = record.iter().map(ToString::to_string).collect();
            // Short rows happen when trailing cells are blank; pad them.
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)
            .context("Failed to write CSV header")?;
        for row in &self.rows {
            wtr.write_record(row).context("Failed to write CSV row")?;
        }
        wtr.flush().context("Failed to flush CSV output")?;
        Ok(())
    }

    pub fn read_csv_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_csv_reader(file)
    }

    pub fn write_csv_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.to_csv_writer(file)
    }

    /// Decode every row into a typed record. Serde field renames are matched
    /// against the header, so column order does not matter.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let mut buf = Vec::new();
        self.to_csv_writer(&mut buf)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(buf.as_slice());
        let mut out = Vec::with_capacity(self.rows.len());
        for (line, result) in rdr.deserialize().enumerate() {
            let record: T =
                result.with_context(|| format!("Failed to decode row {}", line + 2))?;
            out.push(record);
        }
        Ok(out)
    }

    /// Encode typed records into a table, deriving the header from the
    /// records' serde field names.
    pub fn encode<T: Serialize>(records: &[T]) -> Result<Self> {
        let mut buf = Vec::new();
        {
            let mut wtr = csv::Writer::from_writer(&mut buf);
            for record in records {
                wtr.serialize(record).context("Failed to encode record")?;
            }
            wtr.flush().context("Failed to flush CSV output")?;
        }
        if buf.is_empty() {
            bail!("Cannot encode an empty record list (no header to derive)");
        }
        Self::from_csv_reader(buf.as_slice())
    }

    /// Append typed records to this table's rows, matching on the header.
    pub fn append<T: Serialize>(&mut self, records: &[T]) -> Result<()> {
        let encoded = Self::encode(records)?;
        if encoded.columns != self.columns {
            bail!(
                "Record columns {:?} do not match table columns {:?}",
                encoded.columns,
                self.columns
            );
        }
        self.rows.extend(encoded.rows);
        Ok(())
    }
}

/// The predefined (empty) column set for a known sheet name. Per-person
/// sheets match on prefix (`food_log_bela`, `weight_log_marleen`, ...).
#[must_use]
pub fn empty_schema(sheet_name: &str) -> Table {
    match sheet_name {
        "food_data" => Table::new(&[
            "Name",
            "Fat (g)",
            "Carbs (g)",
            "Protein (g)",
            "Calories (kcal)",
            "Serving Name",
            "Single Serving (g)",
            "Type",
        ]),
        "recipe_info" => Table::new(&["name", "description"]),
        "recipe_tags" => Table::new(&["name", "tag"]),
        "recipe_ingredients" => Table::new(&["name", "ingredient", "quantity", "serving"]),
        "recipe_instructions" => Table::new(&["name", "instruction"]),
        "available_tags" => Table::new(&["tag"]),
        "new_recipe_ingredients" => Table::new(&["ingredient", "quantity", "serving"]),
        "new_recipe_instructions" => Table::new(&["instruction"]),
        "new_recipe_tags" => Table::new(&["tag"]),
        name if name.starts_with("food_log") => {
            Table::new(&["date", "meal", "name", "quantity", "serving"])
        }
        name if name.starts_with("weight_log") => Table::new(&["date", "weight"]),
        name if name.starts_with("exercise_log") => Table::new(&["date", "exercise", "minutes"]),
        name if name.starts_with("target") => Table::new(&["target"]),
        name if name.starts_with("info") => Table::new(&["height", "birthday", "sex"]),
        _ => Table::new(&[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        date: String,
        weight: f64,
    }

    #[test]
    fn test_csv_round_trip() {
        let mut table = Table::new(&["date", "weight"]);
        table
            .push_row(vec!["2024-01-01".to_string(), "90.5".to_string()])
            .unwrap();

        let mut buf = Vec::new();
        table.to_csv_writer(&mut buf).unwrap();
        let parsed = Table::from_csv_reader(buf.as_slice()).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_push_row_wrong_width() {
        let mut table = Table::new(&["date", "weight"]);
        assert!(table.push_row(vec!["2024-01-01".to_string()]).is_err());
    }

    #[test]
    fn test_decode_ignores_column_order() {
        let csv = "weight,date\n90.5,2024-01-01\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        let rows: Vec<Row> = table.decode().unwrap();
        assert_eq!(
            rows,
            vec![Row {
                date: "2024-01-01".to_string(),
                weight: 90.5
            }]
        );
    }

    #[test]
    fn test_encode_derives_header() {
        let rows = vec![Row {
            date: "2024-01-01".to_string(),
            weight: 88.0,
        }];
        let table = Table::encode(&rows).unwrap();
        assert_eq!(table.columns(), ["date", "weight"]);
        assert_eq!(table.rows()[0][0], "2024-01-01");
    }

    #[test]
    fn test_encode_empty_fails() {
        let rows: Vec<Row> = Vec::new();
        assert!(Table::encode(&rows).is_err());
    }

    #[test]
    fn test_append_matching_columns() {
        let mut table = empty_schema("weight_log_bela");
        table
            .append(&[Row {
                date: "2024-01-01".to_string(),
                weight: 91.0,
            }])
            .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_append_mismatched_columns() {
        let mut table = empty_schema("target_bela");
        let result = table.append(&[Row {
            date: "2024-01-01".to_string(),
            weight: 91.0,
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn test_retain_rows() {
        let mut table = Table::new(&["tag"]);
        table.push_row(vec!["vegan".to_string()]).unwrap();
        table.push_row(vec!["quick".to_string()]).unwrap();
        table.retain_rows(|r| r[0] != "vegan");
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0][0], "quick");
    }

    #[test]
    fn test_empty_schema_person_prefixes() {
        assert_eq!(
            empty_schema("food_log_bela").columns(),
            ["date", "meal", "name", "quantity", "serving"]
        );
        assert_eq!(
            empty_schema("weight_log_marleen").columns(),
            ["date", "weight"]
        );
        assert_eq!(empty_schema("target_bela").columns(), ["target"]);
        assert_eq!(
            empty_schema("info_bela").columns(),
            ["height", "birthday", "sex"]
        );
    }

    #[test]
    fn test_empty_schema_unknown_sheet() {
        let table = empty_schema("no_such_sheet");
        assert!(table.columns().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_short_rows_padded() {
        let csv = "a,b,c\n1,2\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.rows()[0], vec!["1", "2", ""]);
    }
}
