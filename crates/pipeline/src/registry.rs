// Adapter dispatch by source kind

use trustgrid_config::PipelineConfig;
use trustgrid_core::{SourceAdapter, SourceType};
use trustgrid_fetch::{ApiAdapter, ScrapeAdapter};
use trustgrid_io::{
    CsvAdapter, DocxAdapter, HtmlLimits, JsonAdapter, ParquetAdapter, PdfAdapter,
    UniversalAdapter, XlsxAdapter, XmlAdapter, ZipMediaAdapter,
};

/// The adapter that ingests `source_type`, configured from `config`.
pub fn adapter_for(source_type: SourceType, config: &PipelineConfig) -> Box<dyn SourceAdapter> {
    match source_type {
        SourceType::Api => Box::new(ApiAdapter::new(config.fetch.clone())),
        SourceType::Scraping => Box::new(ScrapeAdapter::new(config.fetch.clone(), &config.scrape)),
        SourceType::CsvUpload => Box::new(CsvAdapter),
        SourceType::JsonUpload => Box::new(JsonAdapter),
        SourceType::XlsxUpload => Box::new(XlsxAdapter),
        SourceType::PdfUpload => Box::new(PdfAdapter),
        SourceType::DocxUpload => Box::new(DocxAdapter),
        SourceType::XmlUpload => Box::new(XmlAdapter),
        SourceType::ParquetUpload => Box::new(ParquetAdapter),
        SourceType::ZipUpload => Box::new(ZipMediaAdapter),
        SourceType::UniversalUpload => Box::new(UniversalAdapter {
            html: HtmlLimits {
                max_records: config.scrape.max_records,
                min_list_items: config.scrape.min_list_items,
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_source_kind_has_an_adapter() {
        let config = PipelineConfig::default();
        let names: Vec<&str> = SourceType::ALL
            .iter()
            .map(|t| adapter_for(*t, &config).name())
            .collect();
        assert_eq!(
            names,
            vec!["api", "scraping", "csv", "json", "xlsx", "pdf", "docx", "xml", "parquet", "zip", "universal"]
        );
    }
}
