//! Render pool for the browser-print backend
//!
//! One long-lived [`BrowserEngine`] hands out exclusive pages. The number of
//! concurrently open pages is bounded by a semaphore; `init`, `restart` and
//! `shutdown` are serialized by a lifecycle lock. A dead engine is reported as
//! unavailable and never silently replaced by another backend.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::BrowserSettings;
use crate::error::{PoolError, RenderError};
use crate::model::Orientation;
use crate::render::backends::{PrintJob, PrintOptions};

/// A started browser able to open pages. Calls block; the pool runs them on
/// the blocking thread pool.
pub trait BrowserEngine: Send + Sync + 'static {
    fn launch(&self) -> Result<(), PoolError>;
    fn is_alive(&self) -> bool;
    fn open_page(&self) -> Result<Box<dyn BrowserPage>, PoolError>;
    fn shutdown(&self);
}

/// An exclusive page (tab) of a [`BrowserEngine`]
pub trait BrowserPage: Send {
    fn print_pdf(&mut self, html: &str, options: &PrintOptions) -> Result<Vec<u8>, RenderError>;
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolState {
    Uninitialized,
    Ready,
    Failed(String),
    Shutdown,
}

/// Snapshot returned by [`RenderPool::health`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHealth {
    pub state: PoolState,
    pub engine_alive: bool,
    pub idle_permits: usize,
    pub max_pages: usize,
}

impl PoolHealth {
    pub fn is_healthy(&self) -> bool {
        self.state == PoolState::Ready && self.engine_alive
    }
}

pub struct RenderPool {
    engine: Arc<dyn BrowserEngine>,
    lifecycle: tokio::sync::Mutex<()>,
    state: Mutex<PoolState>,
    permits: Arc<Semaphore>,
    max_pages: usize,
}

async fn blocking<T, F>(f: F) -> Result<T, PoolError>
where
    F: FnOnce() -> Result<T, PoolError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PoolError::Launch(e.to_string()))?
}

impl RenderPool {
    pub fn new(engine: Arc<dyn BrowserEngine>, max_pages: usize) -> Self {
        let max_pages = max_pages.max(1);
        Self {
            engine,
            lifecycle: tokio::sync::Mutex::new(()),
            state: Mutex::new(PoolState::Uninitialized),
            permits: Arc::new(Semaphore::new(max_pages)),
            max_pages,
        }
    }

    /// Pool over a headless Chromium found from `settings`
    pub fn chromium(settings: &BrowserSettings) -> Self {
        Self::new(Arc::new(ChromiumEngine::new(settings)), settings.max_pages)
    }

    fn state(&self) -> PoolState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(_) => PoolState::Failed("pool state lock poisoned".into()),
        }
    }

    fn set_state(&self, next: PoolState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Start the engine if it is not running. Failure is recorded, not fatal:
    /// the pool keeps answering with `Unavailable` until a restart succeeds.
    pub async fn init(&self) -> Result<(), PoolError> {
        let _guard = self.lifecycle.lock().await;
        match self.state() {
            PoolState::Ready if self.engine.is_alive() => return Ok(()),
            PoolState::Shutdown => {
                return Err(PoolError::Unavailable("render pool is shut down".into()))
            }
            _ => {}
        }
        self.launch().await
    }

    async fn launch(&self) -> Result<(), PoolError> {
        let engine = self.engine.clone();
        match blocking(move || engine.launch()).await {
            Ok(()) => {
                log::info!("Render pool ready ({} pages)", self.max_pages);
                self.set_state(PoolState::Ready);
                Ok(())
            }
            Err(e) => {
                log::warn!("Render pool failed to start: {}", e);
                self.set_state(PoolState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Wait for a free slot and open an exclusive page
    pub async fn acquire(&self) -> Result<PageLease, PoolError> {
        match self.state() {
            PoolState::Ready => {}
            PoolState::Failed(reason) => return Err(PoolError::Unavailable(reason)),
            PoolState::Uninitialized => {
                return Err(PoolError::Unavailable("render pool not initialized".into()))
            }
            PoolState::Shutdown => {
                return Err(PoolError::Unavailable("render pool is shut down".into()))
            }
        }
        if !self.engine.is_alive() {
            self.set_state(PoolState::Failed("browser engine exited".into()));
            return Err(PoolError::Unavailable("browser engine exited".into()));
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Unavailable("render pool is shut down".into()))?;

        let engine = self.engine.clone();
        let page = blocking(move || engine.open_page()).await?;
        Ok(PageLease {
            page: Some(page),
            _permit: permit,
        })
    }

    pub fn health(&self) -> PoolHealth {
        PoolHealth {
            state: self.state(),
            engine_alive: self.engine.is_alive(),
            idle_permits: self.permits.available_permits(),
            max_pages: self.max_pages,
        }
    }

    /// Stop and relaunch the engine
    pub async fn restart(&self) -> Result<(), PoolError> {
        let _guard = self.lifecycle.lock().await;
        if self.state() == PoolState::Shutdown {
            return Err(PoolError::Unavailable("render pool is shut down".into()));
        }
        log::info!("Restarting render pool");
        let engine = self.engine.clone();
        let _ = tokio::task::spawn_blocking(move || engine.shutdown()).await;
        self.launch().await
    }

    /// Stop the engine for good. Pending and future acquires fail.
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        self.permits.close();
        let engine = self.engine.clone();
        let _ = tokio::task::spawn_blocking(move || engine.shutdown()).await;
        self.set_state(PoolState::Shutdown);
        log::info!("Render pool shut down");
    }
}

/// Exclusive use of one page; the page is closed and its slot released on drop
pub struct PageLease {
    page: Option<Box<dyn BrowserPage>>,
    _permit: OwnedSemaphorePermit,
}

impl PageLease {
    pub async fn print(&mut self, job: PrintJob) -> Result<Vec<u8>, RenderError> {
        let mut page = self
            .page
            .take()
            .ok_or_else(|| RenderError::Browser("page already lost".into()))?;

        let (page, result) = tokio::task::spawn_blocking(move || {
            let result = page.print_pdf(&job.html, &job.options);
            (page, result)
        })
        .await
        .map_err(|e| RenderError::TaskAborted(e.to_string()))?;

        self.page = Some(page);
        result
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        if let Some(mut page) = self.page.take() {
            page.close();
        }
    }
}

/// Browser binaries tried, in order, when none is configured
const CHROMIUM_CANDIDATES: [&str; 5] = [
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

const MM_PER_INCH: f64 = 25.4;
const PT_PER_INCH: f64 = 72.0;

/// DevTools print parameters for `options`. Paper size is given in portrait;
/// Chromium rotates it when `landscape` is set.
pub fn pdf_options(options: &PrintOptions) -> PrintToPdfOptions {
    let (width, height) = options.format.dimensions_pt();
    let margin = options.margin_mm as f64 / MM_PER_INCH;
    PrintToPdfOptions {
        landscape: Some(options.orientation == Orientation::Landscape),
        print_background: Some(options.print_background),
        paper_width: Some(width as f64 / PT_PER_INCH),
        paper_height: Some(height as f64 / PT_PER_INCH),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        display_header_footer: Some(false),
        prefer_css_page_size: Some(false),
        ..Default::default()
    }
}

/// One headless Chromium process, started by `launch` and kept until
/// `shutdown`. Pages are DevTools tabs of that process.
pub struct ChromiumEngine {
    configured: Option<PathBuf>,
    print_timeout: Duration,
    idle_timeout: Duration,
    browser: Mutex<Option<Browser>>,
}

impl ChromiumEngine {
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            configured: settings.binary.clone(),
            print_timeout: settings.print_timeout,
            idle_timeout: settings.idle_timeout,
            browser: Mutex::new(None),
        }
    }

    fn locate(&self) -> Option<PathBuf> {
        match &self.configured {
            Some(path) => path.is_file().then(|| path.clone()),
            None => CHROMIUM_CANDIDATES.iter().find_map(|name| find_on_path(name)),
        }
    }

    fn browser(&self) -> Option<Browser> {
        self.browser.lock().ok().and_then(|b| b.clone())
    }
}

impl BrowserEngine for ChromiumEngine {
    fn launch(&self) -> Result<(), PoolError> {
        let binary = self
            .locate()
            .ok_or_else(|| PoolError::Unavailable("no Chromium binary found".into()))?;

        let options = LaunchOptions::default_builder()
            .path(Some(binary.clone()))
            .headless(true)
            .sandbox(false)
            .idle_browser_timeout(self.idle_timeout)
            .build()
            .map_err(|e| PoolError::Launch(e.to_string()))?;
        let browser = Browser::new(options)
            .map_err(|e| PoolError::Launch(format!("{}: {}", binary.display(), e)))?;

        match browser.get_version() {
            Ok(version) => log::info!("Using {}", version.product),
            Err(e) => return Err(PoolError::Launch(format!("browser not responding: {}", e))),
        }

        let mut slot = self
            .browser
            .lock()
            .map_err(|_| PoolError::Launch("engine lock poisoned".into()))?;
        // Replacing a previous instance drops it, which ends its process
        *slot = Some(browser);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.browser()
            .is_some_and(|browser| browser.get_version().is_ok())
    }

    fn open_page(&self) -> Result<Box<dyn BrowserPage>, PoolError> {
        let browser = self
            .browser()
            .ok_or_else(|| PoolError::Unavailable("browser engine not running".into()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| PoolError::Page(e.to_string()))?;
        tab.set_default_timeout(self.print_timeout);

        let scratch = tempfile::Builder::new()
            .prefix("report-pdf-page-")
            .tempdir()
            .map_err(|e| PoolError::Page(e.to_string()))?;
        Ok(Box::new(ChromiumPage {
            tab: Some(tab),
            scratch: Some(scratch),
        }))
    }

    fn shutdown(&self) {
        if let Ok(mut slot) = self.browser.lock() {
            *slot = None;
        }
    }
}

/// A tab of the shared browser plus a scratch directory for its document
struct ChromiumPage {
    tab: Option<Arc<Tab>>,
    scratch: Option<tempfile::TempDir>,
}

fn browser_error(err: impl std::fmt::Display) -> RenderError {
    RenderError::Browser(err.to_string())
}

impl BrowserPage for ChromiumPage {
    fn print_pdf(&mut self, html: &str, options: &PrintOptions) -> Result<Vec<u8>, RenderError> {
        let (Some(tab), Some(scratch)) = (self.tab.as_ref(), self.scratch.as_ref()) else {
            return Err(RenderError::Browser("page is closed".into()));
        };

        // Loaded from disk; large documents exceed what a data: URL may carry
        let input = scratch.path().join("report.html");
        std::fs::write(&input, html)?;
        let url = format!("file://{}", input.display());

        tab.navigate_to(&url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(browser_error)?;
        let bytes = tab
            .print_to_pdf(Some(pdf_options(options)))
            .map_err(browser_error)?;
        if bytes.is_empty() {
            return Err(RenderError::Browser("browser produced an empty PDF".into()));
        }
        Ok(bytes)
    }

    fn close(&mut self) {
        if let Some(tab) = self.tab.take() {
            if let Err(e) = tab.close(false) {
                log::debug!("Failed to close tab: {}", e);
            }
        }
        if let Some(scratch) = self.scratch.take() {
            if let Err(e) = scratch.close() {
                log::debug!("Failed to remove page scratch dir: {}", e);
            }
        }
    }
}
