//! Automation countermeasures applied before any navigation.

/// Injected with `Page.addScriptToEvaluateOnNewDocument` so it runs before
/// any page script can probe the environment.
pub const STEALTH_SCRIPT: &str = r"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    window.chrome = window.chrome || { runtime: {} };
";

/// Chrome flags: hide the automation banner/blink feature and keep the
/// process lean inside containers.
pub const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-features=VizDisplayCompositor",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-extensions",
    "--no-first-run",
    "--window-size=1920,1080",
];
