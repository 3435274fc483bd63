//! Headless Chrome page fetcher driven over the DevTools protocol.
//!
//! One browser process and one tab are launched on first use and reused for
//! every page until [`PageFetcher::close`] is called.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use vcdossier_shared::{DossierError, Result, ScrapeSettings};

use crate::{PageFetcher, ScrapedPage};

/// Upper bound on "read more" / modal clicks per page.
const MAX_DIALOG_CLICKS: usize = 20;

/// Collects expandable elements into `window.__vcdTargets` and returns the count.
const COLLECT_DIALOG_TARGETS_JS: &str = r#"(() => {
  const byText = Array.from(document.querySelectorAll('button, a'))
    .filter(el => /\b(know|read)\s+more\b/i.test(el.innerText || ''));
  const triggers = Array.from(document.querySelectorAll('[data-toggle="modal"], .modal-trigger'));
  window.__vcdTargets = byText.concat(triggers.filter(el => !byText.includes(el)));
  return window.__vcdTargets.length;
})()"#;

/// HTTP status of the main document, `0` when the browser does not expose it.
const NAVIGATION_STATUS_JS: &str = r#"(() => {
  const entry = performance.getEntriesByType('navigation')[0];
  return entry && entry.responseStatus ? entry.responseStatus : 0;
})()"#;

fn click_target_js(index: usize) -> String {
    format!(
        "(() => {{ const el = (window.__vcdTargets || [])[{index}]; \
         if (!el) return false; try {{ el.click(); return true; }} catch (e) {{ return false; }} }})()"
    )
}

struct Session {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl Session {
    async fn launch(settings: &ScrapeSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder();

        if let Some(path) = find_chrome_binary(settings) {
            builder = builder.chrome_executable(path);
        }
        if settings.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        let user_data_dir =
            std::env::temp_dir().join(format!("vcdossier-chrome-{}", std::process::id()));

        builder = builder
            .window_size(1366, 900)
            .user_data_dir(user_data_dir)
            .request_timeout(Duration::from_secs(settings.navigation_timeout_secs))
            .arg(format!("--user-agent={}", settings.user_agent))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-dev-shm-usage");

        let config = builder
            .build()
            .map_err(|e| DossierError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DossierError::Browser(format!("failed to launch Chrome: {e}")))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DossierError::Browser(format!("failed to open tab: {e}")))?;

        info!(headless = settings.headless, "browser launched");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

/// Fetcher that renders pages in a shared headless Chrome tab.
pub struct BrowserFetcher {
    settings: ScrapeSettings,
    session: Mutex<Option<Session>>,
}

impl BrowserFetcher {
    /// The browser is launched lazily on the first fetch.
    pub fn new(settings: ScrapeSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<()> {
        let first = Duration::from_secs(self.settings.navigation_timeout_secs);
        match tokio::time::timeout(first, page.goto(url)).await {
            Ok(Ok(_)) => return Ok(()),
            Ok(Err(e)) => return Err(DossierError::Browser(format!("navigation failed: {e}"))),
            Err(_) => warn!(
                timeout_secs = self.settings.navigation_timeout_secs,
                "navigation timed out, retrying with fallback budget"
            ),
        }

        let fallback = Duration::from_secs(self.settings.fallback_timeout_secs);
        match tokio::time::timeout(fallback, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DossierError::Browser(format!("navigation failed: {e}"))),
            Err(_) => Err(DossierError::Browser(format!(
                "navigation timed out after {}s",
                self.settings.fallback_timeout_secs
            ))),
        }
    }

    async fn click_dialog_buttons(&self, page: &Page) {
        let count = match page.evaluate(COLLECT_DIALOG_TARGETS_JS).await {
            Ok(result) => result.into_value::<usize>().unwrap_or(0),
            Err(e) => {
                debug!(error = %e, "dialog scan failed");
                return;
            }
        };
        if count == 0 {
            return;
        }

        debug!(count, "expanding dialogs");
        let delay = Duration::from_millis(self.settings.dialog_click_delay_ms);
        for index in 0..count.min(MAX_DIALOG_CLICKS) {
            if let Err(e) = page.evaluate(click_target_js(index)).await {
                debug!(index, error = %e, "dialog click failed");
            }
            tokio::time::sleep(delay).await;
        }
    }

    async fn render(&self, page: &Page, url: &str) -> Result<ScrapedPage> {
        self.navigate(page, url).await?;

        tokio::time::sleep(Duration::from_millis(self.settings.render_wait_ms)).await;
        self.click_dialog_buttons(page).await;

        let status = page
            .evaluate(NAVIGATION_STATUS_JS)
            .await
            .ok()
            .and_then(|r| r.into_value::<u16>().ok())
            .unwrap_or(0);

        let html = page
            .content()
            .await
            .map_err(|e| DossierError::Browser(format!("failed to read page content: {e}")))?;

        Ok(ScrapedPage {
            url: url.to_string(),
            // A completed navigation without timing data is treated as OK.
            status_code: if status == 0 { 200 } else { status },
            html: Some(html),
            error: None,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> ScrapedPage {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            match Session::launch(&self.settings).await {
                Ok(session) => *guard = Some(session),
                Err(e) => {
                    warn!(error = %e, "browser unavailable");
                    return ScrapedPage::failed(url, e.to_string());
                }
            }
        }
        let Some(session) = guard.as_ref() else {
            return ScrapedPage::failed(url, "browser session missing");
        };

        match self.render(&session.page, url).await {
            Ok(page) => {
                debug!(status_code = page.status_code, "page rendered");
                page
            }
            Err(e) => {
                warn!(error = %e, "page render failed");
                ScrapedPage::failed(url, e.to_string())
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };
        let result = session
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| DossierError::Browser(format!("failed to close browser: {e}")));
        session.handler.abort();
        info!("browser closed");
        result
    }
}

/// Locate a Chrome/Chromium binary; `None` leaves detection to chromiumoxide.
fn find_chrome_binary(settings: &ScrapeSettings) -> Option<PathBuf> {
    if let Some(path) = settings.chrome_path.as_deref().map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
        warn!(path = %path.display(), "configured chrome_path does not exist");
    }

    #[cfg(target_os = "macos")]
    let candidates: &[&str] = &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
    ];
    #[cfg(target_os = "linux")]
    let candidates: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
    ];
    #[cfg(target_os = "windows")]
    let candidates: &[&str] = &[
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ];
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    let candidates: &[&str] = &[];

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
