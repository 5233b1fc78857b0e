use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leadfit_core::{LeadIdentity, RequestContext, SourceAdapter, SourceError, WebTechFacts};
use playwright::api::Playwright;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Hard timeout for a single page load during web-tech detection (§4.3:
/// "a 15 s page-load timeout"), shorter than [`crate::http::SOURCE_HARD_TIMEOUT`]
/// since it bounds a single render rather than a retried HTTP call.
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Process-wide, lazily-launched Chromium instance (§5 "Shared resources --
/// Browser instance", §9 "process-wide browser singleton"). One browser is
/// shared across every `enrich` call; pages are opened and closed per
/// request so no state leaks between leads.
struct BrowserPool {
    inner: Mutex<Option<(Playwright, playwright::api::Browser)>>,
}

impl BrowserPool {
    fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    async fn with_page<F, Fut, T>(&self, f: F) -> Result<T, SourceError>
    where
        F: FnOnce(playwright::api::Page) -> Fut,
        Fut: std::future::Future<Output = Result<T, SourceError>>,
    {
        let mut guard = self.inner.lock().await;
        if guard.is_none() {
            let pw = Playwright::initialize()
                .await
                .map_err(|e| SourceError::Transient(format!("playwright init failed: {e}")))?;
            pw.prepare()
                .map_err(|e| SourceError::Transient(format!("playwright install failed: {e}")))?;
            let browser = pw
                .chromium()
                .launcher()
                .headless(true)
                .launch()
                .await
                .map_err(|e| SourceError::Transient(format!("browser launch failed: {e}")))?;
            *guard = Some((pw, browser));
        }
        let (_, browser) = guard.as_ref().expect("just initialized above");

        let context = browser
            .context_builder()
            .build()
            .await
            .map_err(|e| SourceError::Transient(format!("browser context failed: {e}")))?;
        let page = context
            .new_page()
            .await
            .map_err(|e| SourceError::Transient(format!("page open failed: {e}")))?;

        let result = f(page).await;
        // Scoped acquisition: close the context regardless of how `f` exited
        // so a failed render never leaks a page (§9).
        let _ = context.close().await;
        result
    }

    /// Explicit teardown hook for process shutdown (§9).
    async fn shutdown(&self) {
        if let Some((_, browser)) = self.inner.lock().await.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "browser close failed during shutdown");
            }
        }
    }
}

/// Fingerprints matched against the rendered page's HTML to detect each
/// tracker (§4.3). These are well-known snippets each vendor's tag injects
/// into the DOM/script body; detection is best-effort text matching rather
/// than a network-request inspection, since this engine doesn't reproduce
/// the upstream wire format of any of these vendors.
struct Fingerprint {
    tool: &'static str,
    needles: &'static [&'static str],
}

const CONVERSION_PIXEL: Fingerprint =
    Fingerprint { tool: "meta_pixel", needles: &["connect.facebook.net", "fbq("] };
const ANALYTICS_TAG: Fingerprint =
    Fingerprint { tool: "ga4", needles: &["googletagmanager.com/gtag/js", "gtag("] };
const ADS_CONVERSION_TAG: Fingerprint =
    Fingerprint { tool: "google_ads", needles: &["googleadservices.com", "AW-"] };
const SECOND_NETWORK_PIXEL: Fingerprint =
    Fingerprint { tool: "tiktok_pixel", needles: &["analytics.tiktok.com", "ttq.load("] };
const MARKETING_AUTOMATION: Fingerprint =
    Fingerprint { tool: "hubspot", needles: &["js.hs-scripts.com", "js.hubspot.com"] };

fn matches(html: &str, fp: &Fingerprint) -> bool {
    fp.needles.iter().any(|needle| html.contains(needle))
}

/// Adapter over in-browser web-tech detection (§4.3 "web-tech detection
/// adapter"). Only invoked when the identity carries a website; otherwise
/// the orchestrator never calls it and the all-false default applies.
pub struct WebTechAdapter {
    pool: Arc<BrowserPool>,
}

impl WebTechAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self { pool: Arc::new(BrowserPool::new()) }
    }

    /// Releases the shared browser. Call once during process shutdown.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    async fn detect(&self, website: &str, ctx: &RequestContext) -> Result<WebTechFacts, SourceError> {
        let render = self.pool.with_page(|page| {
            let website = website.to_string();
            async move {
                page.goto_builder(&website)
                    .goto()
                    .await
                    .map_err(|e| SourceError::Transient(format!("navigation failed: {e}")))?;
                page.content()
                    .await
                    .map_err(|e| SourceError::Transient(format!("content read failed: {e}")))
            }
        });

        // Races the page load/render against both the adapter's own hard
        // timeout and the request's cancellation token, so an exceeded
        // deadline or caller abort interrupts an in-flight render rather
        // than letting it run to completion (§5(c)).
        let html = tokio::select! {
            result = tokio::time::timeout(PAGE_LOAD_TIMEOUT, render) => {
                result.map_err(|_elapsed| SourceError::Timeout)??
            }
            () = ctx.token().cancelled() => return Err(SourceError::Timeout),
        };

        let mut facts = WebTechFacts {
            has_conversion_pixel: matches(&html, &CONVERSION_PIXEL),
            has_analytics_tag: matches(&html, &ANALYTICS_TAG),
            has_ads_conversion_tag: matches(&html, &ADS_CONVERSION_TAG),
            has_second_network_pixel: matches(&html, &SECOND_NETWORK_PIXEL),
            has_marketing_automation: matches(&html, &MARKETING_AUTOMATION),
            tools: Vec::new(),
        };
        for fp in [
            &CONVERSION_PIXEL,
            &ANALYTICS_TAG,
            &ADS_CONVERSION_TAG,
            &SECOND_NETWORK_PIXEL,
            &MARKETING_AUTOMATION,
        ] {
            if matches(&html, fp) {
                facts.tools.push(fp.tool.to_string());
            }
        }
        Ok(facts)
    }
}

impl Default for WebTechAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter<WebTechFacts> for WebTechAdapter {
    fn source_name(&self) -> &'static str {
        "webtech"
    }

    async fn enrich(
        &self,
        identity: &LeadIdentity,
        ctx: &RequestContext,
    ) -> Result<Option<WebTechFacts>, SourceError> {
        let Some(website) = identity.website.as_deref() else {
            debug!(source = "webtech", "no website on identity, skipping detection");
            return Ok(Some(WebTechFacts::default()));
        };

        match self.detect(website, ctx).await {
            Ok(facts) => Ok(Some(facts)),
            Err(err) => {
                // Missing/unreachable/failed-render all collapse to the
                // all-false default rather than an error (§3, §4.3).
                debug!(source = "webtech", website, error = %err, "detection failed, using all-false default");
                Ok(Some(WebTechFacts::default()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_conversion_pixel_fingerprint() {
        let html = r#"<script src="https://connect.facebook.net/en_US/fbevents.js"></script>"#;
        assert!(matches(html, &CONVERSION_PIXEL));
        assert!(!matches(html, &ANALYTICS_TAG));
    }

    #[test]
    fn matches_multiple_fingerprints_independently() {
        let html = r#"
            <script async src="https://www.googletagmanager.com/gtag/js?id=G-XXXX"></script>
            <script>gtag('config', 'G-XXXX');</script>
            <script src="https://analytics.tiktok.com/i18n/pixel/events.js"></script>
        "#;
        assert!(matches(html, &ANALYTICS_TAG));
        assert!(matches(html, &SECOND_NETWORK_PIXEL));
        assert!(!matches(html, &CONVERSION_PIXEL));
        assert!(!matches(html, &ADS_CONVERSION_TAG));
        assert!(!matches(html, &MARKETING_AUTOMATION));
    }

    #[test]
    fn no_fingerprints_match_plain_page() {
        let html = "<html><body><h1>Hello</h1></body></html>";
        assert!(!matches(html, &CONVERSION_PIXEL));
        assert!(!matches(html, &ANALYTICS_TAG));
        assert!(!matches(html, &ADS_CONVERSION_TAG));
        assert!(!matches(html, &SECOND_NETWORK_PIXEL));
        assert!(!matches(html, &MARKETING_AUTOMATION));
    }
}
