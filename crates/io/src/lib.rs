//! File upload adapters.
//!
//! Each adapter checks extension and content signature, then turns the
//! upload into [`RawItem`](trustgrid_core::RawItem)s. Parsing functions are
//! public so the universal adapter and the web scraper can reuse them.

pub mod csv;
pub mod docx;
pub mod html;
pub mod json;
pub mod media;
pub mod parquet;
pub mod pdf;
pub mod sniff;
pub mod text;
pub mod universal;
mod upload;
pub mod xlsx;
pub mod xml;

pub use csv::CsvAdapter;
pub use docx::DocxAdapter;
pub use html::HtmlLimits;
pub use json::JsonAdapter;
pub use media::ZipMediaAdapter;
pub use parquet::ParquetAdapter;
pub use pdf::PdfAdapter;
pub use universal::UniversalAdapter;
pub use xlsx::XlsxAdapter;
pub use xml::XmlAdapter;
