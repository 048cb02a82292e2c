//! Chrome session over CDP (chromiumoxide).
//!
//! Element lookup, clicks and page source all run as scripts against the
//! current document, which is the top-level document of the current tab or
//! a same-origin frame reached through `switch_to_frame`.

#[cfg(feature = "browser")]
mod imp {
    use std::time::Duration;

    use async_trait::async_trait;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::StreamExt;
    use tracing::{debug, info, warn};

    use super::super::{BrowserEngineConfig, BrowserError, BrowserSession, ElementHandle};

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    const READY_SCRIPT: &str = r#"
        new Promise((resolve) => {
            if (document.readyState === 'complete' || document.readyState === 'interactive') {
                resolve(document.readyState);
            } else {
                document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                setTimeout(() => resolve('timeout'), 10000);
            }
        })
    "#;

    #[derive(serde::Deserialize)]
    struct QueryResult {
        found: bool,
        items: Vec<ElementHandle>,
    }

    #[derive(serde::Deserialize)]
    struct SourceResult {
        found: bool,
        html: String,
    }

    /// Browser session backed by a launched or remote Chrome.
    pub struct ChromeSession {
        config: BrowserEngineConfig,
        browser: Browser,
        page: Page,
        /// Frame selectors from the top document down to the current one.
        frames: Vec<String>,
    }

    /// Find Chrome executable.
    fn find_chrome() -> Result<std::path::PathBuf, BrowserError> {
        for path in CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(BrowserError::Launch(
            "Chrome/Chromium not found; install it or set BROWSER_URL to a remote browser"
                .to_string(),
        ))
    }

    fn protocol(e: impl std::fmt::Display) -> BrowserError {
        BrowserError::Protocol(e.to_string())
    }

    impl ChromeSession {
        /// Which browser a launch would use, without starting it.
        pub fn locate(config: &BrowserEngineConfig) -> Result<String, BrowserError> {
            match config.remote_url {
                Some(ref url) => Ok(format!("remote {}", url)),
                None => find_chrome().map(|path| path.display().to_string()),
            }
        }

        /// Launch a local browser, or connect to `config.remote_url` if set.
        pub async fn launch(config: BrowserEngineConfig) -> Result<Self, BrowserError> {
            let browser = match config.remote_url.clone() {
                Some(remote_url) => Self::connect_remote(&config, &remote_url).await?,
                None => Self::launch_local(&config).await?,
            };
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            Ok(Self {
                config,
                browser,
                page,
                frames: Vec::new(),
            })
        }

        async fn launch_local(config: &BrowserEngineConfig) -> Result<Browser, BrowserError> {
            info!("Launching browser (headless={})", config.headless);
            let chrome_path = find_chrome()?;

            let mut builder = BrowserConfig::builder()
                .chrome_executable(chrome_path)
                .request_timeout(Duration::from_secs(config.timeout));

            // with_head means NOT headless
            if !config.headless {
                builder = builder.with_head();
            }
            if let Some(ref proxy) = config.proxy {
                builder = builder.arg(format!("--proxy-server={}", proxy));
            }

            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--disable-sync")
                .arg("--disable-translate")
                .arg("--no-sandbox")
                .arg("--disable-gpu");

            for arg in &config.chrome_args {
                builder = builder.arg(arg);
            }

            let browser_config = builder.build().map_err(BrowserError::Launch)?;
            let (browser, mut handler) = Browser::launch(browser_config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok(browser)
        }

        /// Connect to a remote Chrome through its `/json/version` endpoint.
        async fn connect_remote(
            config: &BrowserEngineConfig,
            url: &str,
        ) -> Result<Browser, BrowserError> {
            info!(
                "Connecting to remote browser at {} (timeout: {}s)",
                url, config.timeout
            );

            let http_url = url
                .replace("ws://", "http://")
                .replace("wss://", "https://");
            let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

            let resp: serde_json::Value = reqwest::Client::new()
                .get(&version_url)
                .send()
                .await
                .map_err(|e| BrowserError::Connect(e.to_string()))?
                .json()
                .await
                .map_err(|e| BrowserError::Connect(format!("bad version info: {e}")))?;

            let ws_url = resp
                .get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .ok_or_else(|| BrowserError::Connect("no webSocketDebuggerUrl".to_string()))?;

            info!("Connecting to WebSocket: {}", ws_url);

            let handler_config = chromiumoxide::handler::HandlerConfig {
                request_timeout: Duration::from_secs(config.timeout),
                ..Default::default()
            };

            let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
                .await
                .map_err(|e| BrowserError::Connect(e.to_string()))?;

            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok(browser)
        }

        /// JS expression evaluating to the current document (or null).
        fn document_expr(&self) -> String {
            let frames = serde_json::to_string(&self.frames).unwrap_or_else(|_| "[]".into());
            format!(
                "(() => {{ let d = document; for (const s of {frames}) {{ \
                 const f = d && d.querySelector(s); d = f ? f.contentDocument : null; }} \
                 return d; }})()"
            )
        }

        async fn eval<T: serde::de::DeserializeOwned>(
            &self,
            script: String,
        ) -> Result<T, BrowserError> {
            self.page
                .evaluate(script)
                .await
                .map_err(protocol)?
                .into_value()
                .map_err(protocol)
        }

        async fn settle(&self) {
            let timeout = Duration::from_secs(self.config.timeout);
            match tokio::time::timeout(timeout, self.page.evaluate(READY_SCRIPT.to_string())).await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!("Could not check ready state: {}", e),
                Err(_) => warn!("Timeout waiting for page ready state"),
            }
            tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        }
    }

    #[async_trait]
    impl BrowserSession for ChromeSession {
        async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
            info!("Navigating to {}", url);
            self.page
                .goto(url)
                .await
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            self.frames.clear();
            self.settle().await;
            Ok(())
        }

        async fn find_elements(
            &mut self,
            selector: &str,
        ) -> Result<Vec<ElementHandle>, BrowserError> {
            let sel = serde_json::to_string(selector).map_err(protocol)?;
            let script = format!(
                "(() => {{ const d = {doc}; if (!d) return {{ found: false, items: [] }}; \
                 return {{ found: true, items: Array.from(d.querySelectorAll({sel})).map((e, i) => ({{ \
                 selector: {sel}, index: i, \
                 text: (e.innerText || e.textContent || e.value || '').trim(), \
                 attributes: Object.fromEntries(Array.from(e.attributes).map(a => [a.name, a.value])) \
                 }})) }}; }})()",
                doc = self.document_expr(),
            );
            let result: QueryResult = self.eval(script).await?;
            if !result.found {
                return Err(BrowserError::FrameNotFound(self.frames.join(" > ")));
            }
            Ok(result.items)
        }

        async fn click(&mut self, element: &ElementHandle) -> Result<(), BrowserError> {
            let sel = serde_json::to_string(&element.selector).map_err(protocol)?;
            let script = format!(
                "(() => {{ const d = {doc}; const e = d && d.querySelectorAll({sel})[{idx}]; \
                 if (!e) return false; e.click(); return true; }})()",
                doc = self.document_expr(),
                idx = element.index,
            );
            let clicked: bool = self.eval(script).await?;
            if !clicked {
                return Err(BrowserError::StaleElement {
                    selector: element.selector.clone(),
                    index: element.index,
                });
            }
            self.settle().await;
            Ok(())
        }

        async fn page_source(&mut self) -> Result<String, BrowserError> {
            let script = format!(
                "(() => {{ const d = {}; return d ? {{ found: true, html: d.documentElement.outerHTML }} \
                 : {{ found: false, html: '' }}; }})()",
                self.document_expr()
            );
            let source: SourceResult = self.eval(script).await?;
            if !source.found {
                return Err(BrowserError::FrameNotFound(self.frames.join(" > ")));
            }
            Ok(source.html)
        }

        async fn switch_to_frame(&mut self, selector: &str) -> Result<(), BrowserError> {
            self.frames.push(selector.to_string());
            let script = format!("(() => {} !== null)()", self.document_expr());
            let reachable: bool = self.eval(script).await?;
            if !reachable {
                self.frames.pop();
                return Err(BrowserError::FrameNotFound(selector.to_string()));
            }
            Ok(())
        }

        async fn switch_to_default(&mut self) -> Result<(), BrowserError> {
            self.frames.clear();
            Ok(())
        }

        async fn switch_to_tab(&mut self, index: usize) -> Result<(), BrowserError> {
            let pages = self.browser.pages().await.map_err(protocol)?;
            let count = pages.len();
            let page = pages
                .into_iter()
                .nth(index)
                .ok_or(BrowserError::NoSuchTab { index, count })?;
            self.page = page;
            self.frames.clear();
            self.settle().await;
            Ok(())
        }

        async fn tab_count(&mut self) -> Result<usize, BrowserError> {
            Ok(self.browser.pages().await.map_err(protocol)?.len())
        }

        async fn close_tab(&mut self) -> Result<(), BrowserError> {
            self.page.clone().close().await.map_err(protocol)?;
            self.switch_to_tab(0).await
        }

        async fn current_url(&mut self) -> Result<String, BrowserError> {
            Ok(self
                .page
                .url()
                .await
                .map_err(protocol)?
                .map(|u| u.to_string())
                .unwrap_or_default())
        }

        async fn close(&mut self) {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
        }
    }
}

#[cfg(not(feature = "browser"))]
mod imp {
    use async_trait::async_trait;

    use super::super::{BrowserEngineConfig, BrowserError, BrowserSession, ElementHandle};

    /// Stub for builds without the `browser` feature.
    pub struct ChromeSession;

    impl ChromeSession {
        pub fn locate(_config: &BrowserEngineConfig) -> Result<String, BrowserError> {
            Err(BrowserError::NotCompiled)
        }

        pub async fn launch(_config: BrowserEngineConfig) -> Result<Self, BrowserError> {
            Err(BrowserError::NotCompiled)
        }
    }

    #[async_trait]
    impl BrowserSession for ChromeSession {
        async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn find_elements(
            &mut self,
            _selector: &str,
        ) -> Result<Vec<ElementHandle>, BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn click(&mut self, _element: &ElementHandle) -> Result<(), BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn page_source(&mut self) -> Result<String, BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn switch_to_frame(&mut self, _selector: &str) -> Result<(), BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn switch_to_default(&mut self) -> Result<(), BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn switch_to_tab(&mut self, _index: usize) -> Result<(), BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn tab_count(&mut self) -> Result<usize, BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn close_tab(&mut self) -> Result<(), BrowserError> {
            Err(BrowserError::NotCompiled)
        }
        async fn current_url(&mut self) -> Result<String, BrowserError> {
            Err(BrowserError::NotCompiled)
        }
    }
}

pub use imp::ChromeSession;
