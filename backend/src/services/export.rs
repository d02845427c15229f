//! Export service: filtered table dumps as CSV or spreadsheet files

use chrono::{DateTime, Utc};
use shared::format::escape_html;
use shared::{ExportFormat, ExportTable, SortDirection};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

use super::query::FilteredQuery;

/// Export service
#[derive(Clone)]
pub struct ExportService {
    db: PgPool,
    max_records: i64,
}

/// Rows selected for export, already rendered as text
#[derive(Debug, Clone)]
pub struct ExportData {
    pub table: ExportTable,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
    pub generated_at: DateTime<Utc>,
}

/// Downloadable file
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Build the export statement. Filter columns must be exported columns.
pub fn export_query(table: ExportTable, filters: &[(String, String)], max_records: i64) -> AppResult<FilteredQuery<'static>> {
    let cells: Vec<String> = table
        .columns()
        .iter()
        .map(|c| format!("r.{}::text", c))
        .collect();
    let mut query = FilteredQuery::new(format!(
        "SELECT ARRAY[{}] AS cells FROM {} r",
        cells.join(", "),
        table.table_name()
    ));

    for (column, value) in filters {
        if !table.has_column(column) {
            return Err(AppError::ValidationError(format!(
                "Unknown filter column '{}' for {}",
                column,
                table.table_name()
            )));
        }
        query.equals_text(&format!("r.{}", column), value);
    }

    query
        .order_by(&[("r.id".to_string(), SortDirection::Desc)])
        .limit(max_records);
    Ok(query)
}

impl ExportService {
    pub fn new(db: PgPool, max_records: i64) -> Self {
        Self { db, max_records }
    }

    pub async fn fetch(&self, table: ExportTable, filters: &[(String, String)]) -> AppResult<ExportData> {
        let mut builder = export_query(table, filters, self.max_records)?.into_builder();
        let rows = builder
            .build_query_scalar::<Vec<Option<String>>>()
            .fetch_all(&self.db)
            .await?;

        tracing::info!(table = table.table_name(), rows = rows.len(), "Export prepared");

        Ok(ExportData {
            table,
            columns: table.columns(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
                .collect(),
            generated_at: Utc::now(),
        })
    }

    pub async fn export(&self, table: ExportTable, format: ExportFormat, filters: &[(String, String)]) -> AppResult<ExportFile> {
        let data = self.fetch(table, filters).await?;
        render(&data, format)
    }
}

/// File name such as `toner_master_20240301_101500.csv`
pub fn file_name(data: &ExportData, format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        data.table.table_name(),
        data.generated_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

fn title_line(data: &ExportData) -> String {
    format!("{} Export", data.table.title())
}

fn footer_lines(data: &ExportData) -> [String; 2] {
    [
        format!("Total records: {}", data.rows.len()),
        format!("Generated: {}", data.generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ]
}

pub fn render(data: &ExportData, format: ExportFormat) -> AppResult<ExportFile> {
    let body = match format {
        ExportFormat::Csv => render_csv(data)?,
        ExportFormat::Excel => render_excel(data).into_bytes(),
    };
    Ok(ExportFile {
        filename: file_name(data, format),
        content_type: format.content_type(),
        body,
    })
}

/// Title line, header, rows, then the footer lines
pub fn render_csv(data: &ExportData) -> AppResult<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(vec![]);
    let csv_error = |e: csv::Error| AppError::Internal(format!("CSV serialization error: {}", e));

    wtr.write_record([title_line(data)]).map_err(csv_error)?;
    wtr.write_record(&data.columns).map_err(csv_error)?;
    for row in &data.rows {
        wtr.write_record(row).map_err(csv_error)?;
    }
    for line in footer_lines(data) {
        wtr.write_record([line]).map_err(csv_error)?;
    }

    wtr.into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))
}

/// HTML table workbook
pub fn render_excel(data: &ExportData) -> String {
    let width = data.columns.len().max(1);
    let mut html = String::from(
        "<html xmlns:x=\"urn:schemas-microsoft-com:office:excel\">\n<head><meta charset=\"utf-8\"></head>\n<body>\n<table border=\"1\">\n",
    );

    html.push_str(&format!(
        "<tr><th colspan=\"{}\">{}</th></tr>\n",
        width,
        escape_html(&title_line(data))
    ));

    html.push_str("<tr>");
    for column in &data.columns {
        html.push_str(&format!("<th>{}</th>", escape_html(column)));
    }
    html.push_str("</tr>\n");

    for row in &data.rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        html.push_str("</tr>\n");
    }

    for line in footer_lines(data) {
        html.push_str(&format!(
            "<tr><td colspan=\"{}\">{}</td></tr>\n",
            width,
            escape_html(&line)
        ));
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}
