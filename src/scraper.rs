use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// A live browser that can render one page at a time.
///
/// Implementations are driven from a blocking worker thread and never shared
/// between workers.
pub trait BrowserSession: Send {
    /// Load `url` and return the rendered markup once `marker` is present.
    fn render(&mut self, url: &str, marker: &str, timeout: Duration) -> Result<String>;

    /// Tear the browser down. Called exactly once by [`BrowserLease`].
    fn close(&mut self);
}

pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Scoped ownership of one browser session; the session is closed when the
/// lease is dropped, whichever way the worker exits.
pub struct BrowserLease {
    worker: usize,
    session: Option<Box<dyn BrowserSession>>,
}

impl BrowserLease {
    pub fn acquire(launcher: &dyn BrowserLauncher, worker: usize) -> Result<Self> {
        let session = launcher.launch()?;
        tracing::debug!(worker, "browser session acquired");
        Ok(Self {
            worker,
            session: Some(session),
        })
    }

    pub fn session(&mut self) -> Result<&mut dyn BrowserSession> {
        match self.session.as_mut() {
            Some(session) => Ok(session.as_mut()),
            None => Err(AppError::Internal("browser session already released".into())),
        }
    }
}

impl Drop for BrowserLease {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
            tracing::debug!(worker = self.worker, "browser session released");
        }
    }
}

/// Where product pages live.
#[derive(Debug, Clone)]
pub struct TargetSite {
    base_url: String,
}

impl TargetSite {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `<base_url>/<identifier>`, identifier inserted verbatim.
    pub fn url_for(&self, identifier: &str) -> String {
        format!("{}/{}", self.base_url, identifier)
    }
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

pub struct PageFetcher {
    site: TargetSite,
    content_marker: String,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(site: TargetSite, content_marker: impl Into<String>, timeout: Duration) -> Self {
        Self {
            site,
            content_marker: content_marker.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(
            TargetSite::new(&config.base_url),
            config.content_marker.clone(),
            config.timeout(),
        )
    }

    pub fn fetch(&self, session: &mut dyn BrowserSession, identifier: &str) -> Result<RenderedPage> {
        let url = self.site.url_for(identifier);
        let html = session.render(&url, &self.content_marker, self.timeout)?;
        Ok(RenderedPage { url, html })
    }
}

/// Launches one headless Chrome per call.
pub struct ChromeLauncher {
    config: ScraperConfig,
}

impl ChromeLauncher {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some((self.config.window_width, self.config.window_height)))
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::BrowserLaunch(format!("invalid launch options: {}", e)))?;

        if let Some(path) = &self.config.browser_binary_path {
            launch_options.path = Some(PathBuf::from(path));
        }

        Ok(launch_options)
    }
}

impl BrowserLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let browser = Browser::new(self.launch_options()?)
            .map_err(|e| AppError::BrowserLaunch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::BrowserLaunch(format!("failed to open tab: {}", e)))?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab: Some(tab),
        }))
    }
}

pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl BrowserSession for ChromeSession {
    fn render(&mut self, url: &str, marker: &str, timeout: Duration) -> Result<String> {
        let tab = self.tab.as_ref().ok_or_else(|| AppError::Navigation {
            url: url.to_string(),
            message: "browser tab is closed".into(),
        })?;

        let navigation_error = |e: anyhow::Error| AppError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };

        tab.navigate_to(url).map_err(navigation_error)?;
        tab.wait_until_navigated().map_err(navigation_error)?;

        // Pages render client-side, so the marker is the only reliable "done" signal.
        tab.wait_for_element_with_custom_timeout(marker, timeout)
            .map_err(|_| AppError::Timeout {
                url: url.to_string(),
                marker: marker.to_string(),
                timeout_secs: timeout.as_secs(),
            })?;

        tab.get_content().map_err(navigation_error)
    }

    fn close(&mut self) {
        if let Some(tab) = self.tab.take() {
            let _ = tab.close(true);
        }
        // Dropping the browser kills the Chrome process.
        self.browser.take();
    }
}
