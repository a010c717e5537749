//! Integration tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::{ExtractionSource, Extractor, ExtractorConfig, ExtractorError};
    use std::sync::Arc;
    use std::time::Duration;
    use tallyman_domain::traits::ExtractionProvider;
    use tallyman_domain::{Page, ProviderError, RawExtraction, Table};
    use tallyman_providers::MockProvider;

    /// Extraction with the given page, table and character counts
    fn shaped(pages: usize, tables: usize, chars: usize) -> RawExtraction {
        let mut page_list: Vec<Page> = (1..=pages)
            .map(|number| Page {
                number,
                ..Page::default()
            })
            .collect();
        for i in 0..tables {
            let idx = i % pages.max(1);
            if let Some(page) = page_list.get_mut(idx) {
                page.tables.push(Table::from_rows([["Total assets", "100"]]));
            }
        }
        RawExtraction {
            provider: String::new(),
            page_count: pages,
            pages: page_list,
            text: "x".repeat(chars),
        }
    }

    fn extractor(
        primary: &MockProvider,
        fallback: Option<&MockProvider>,
    ) -> Extractor {
        Extractor::new(
            Arc::new(primary.clone()),
            fallback.map(|f| Arc::new(f.clone()) as Arc<dyn ExtractionProvider>),
            ExtractorConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_good_primary_skips_fallback() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        let fallback = MockProvider::new("ocr", shaped(2, 2, 1_000));

        let run = extractor(&primary, Some(&fallback))
            .extract(b"doc")
            .await
            .unwrap();

        assert_eq!(run.source, ExtractionSource::Primary);
        assert_eq!(run.provider_name, "layout");
        assert!(!run.fallback_triggered);
        assert!(run.warnings.is_empty());
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sparse_primary_replaced_by_fallback() {
        let primary = MockProvider::new("layout", shaped(10, 0, 50));
        let fallback = MockProvider::new("ocr", shaped(9, 3, 40));

        let run = extractor(&primary, Some(&fallback))
            .extract(b"doc")
            .await
            .unwrap();

        assert!(run.fallback_triggered);
        assert!(run.fallback_accepted());
        assert_eq!(run.provider_name, "ocr");
        assert_eq!(run.raw.provider, "ocr");
        assert_eq!(run.quality.pages, 9);
        let decision = run.acceptance.unwrap();
        assert_eq!(decision.min_page_coverage, 8);
    }

    #[tokio::test]
    async fn test_fallback_rejected_keeps_primary() {
        let primary = MockProvider::new("layout", shaped(10, 0, 50));
        let fallback = MockProvider::new("ocr", shaped(5, 3, 4_000));

        let run = extractor(&primary, Some(&fallback))
            .extract(b"doc")
            .await
            .unwrap();

        assert!(run.fallback_triggered);
        assert_eq!(run.source, ExtractionSource::Primary);
        assert!(run
            .warnings
            .iter()
            .any(|w| w.starts_with("fallback rejected")));
    }

    #[tokio::test]
    async fn test_no_fallback_turns_reasons_into_warnings() {
        let primary = MockProvider::new("layout", shaped(0, 0, 0));

        let run = extractor(&primary, None).extract(b"doc").await.unwrap();

        assert_eq!(run.source, ExtractionSource::Primary);
        assert!(!run.fallback_triggered);
        assert!(run.warnings.contains(&"0 pages detected".to_string()));
        assert!(run.warnings.contains(&"0 tables detected".to_string()));
    }

    #[tokio::test]
    async fn test_primary_failure_uses_any_fallback_output() {
        let primary =
            MockProvider::failing("layout", ProviderError::transient("layout", "HTTP 503"));
        // Would fail the acceptance check, but the primary gave nothing to compare
        let fallback = MockProvider::new("ocr", shaped(1, 0, 10));

        let run = extractor(&primary, Some(&fallback))
            .extract(b"doc")
            .await
            .unwrap();

        assert_eq!(run.source, ExtractionSource::Fallback);
        assert!(run.warnings[0].contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_both_failures_preserved() {
        let primary =
            MockProvider::failing("layout", ProviderError::permanent("layout", "bad key"));
        let fallback = MockProvider::failing("ocr", ProviderError::transient("ocr", "HTTP 502"));

        let err = extractor(&primary, Some(&fallback))
            .extract(b"doc")
            .await
            .unwrap_err();

        match err {
            ExtractorError::AllProvidersFailed { primary, fallback } => {
                assert_eq!(primary.cause, "bad key");
                assert_eq!(fallback.cause, "HTTP 502");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_primary_failure_without_fallback() {
        let primary =
            MockProvider::failing("layout", ProviderError::permanent("layout", "bad key"));

        let err = extractor(&primary, None).extract(b"doc").await.unwrap_err();
        assert!(matches!(err, ExtractorError::Provider(e) if e.cause == "bad key"));
    }

    #[tokio::test]
    async fn test_fallback_failure_after_low_quality_keeps_primary() {
        let primary = MockProvider::new("layout", shaped(3, 0, 100));
        let fallback = MockProvider::failing("ocr", ProviderError::transient("ocr", "HTTP 500"));

        let run = extractor(&primary, Some(&fallback))
            .extract(b"doc")
            .await
            .unwrap();

        assert_eq!(run.source, ExtractionSource::Primary);
        assert!(run.fallback_triggered);
        assert!(run.warnings.iter().any(|w| w.contains("HTTP 500")));
    }

    #[tokio::test]
    async fn test_primary_timeout_feeds_fallback() {
        let primary =
            MockProvider::new("layout", shaped(2, 2, 1_000)).with_delay(Duration::from_secs(5));
        let fallback = MockProvider::new("ocr", shaped(2, 2, 1_000));

        let mut config = ExtractorConfig::default();
        config.provider_timeout_secs = 1;
        let fallback: Arc<dyn ExtractionProvider> = Arc::new(fallback);
        let extractor = Extractor::new(Arc::new(primary), Some(fallback), config).unwrap();

        let run = extractor.extract(b"doc").await.unwrap();
        assert_eq!(run.source, ExtractionSource::Fallback);
        assert!(run.warnings[0].contains("timed out after 1s"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ExtractorConfig::default();
        config.text_coverage_ratio = 2.0;
        let primary = MockProvider::new("layout", RawExtraction::empty("layout"));

        let result = Extractor::new(Arc::new(primary), None, config);
        assert!(matches!(result, Err(ExtractorError::Config(_))));
    }
}
