//! Evasion scripts evaluated in the page when the stealth engine is active.
//! Based on puppeteer-extra-plugin-stealth techniques.

pub const STEALTH_SCRIPTS: &[&str] = &[
    // Hide the webdriver flag
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Chrome runtime object present in real browsers
    r#"
    window.chrome = window.chrome || {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    r#"
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' }
        ],
        configurable: true
    });
    "#,
    // Review sites serve Turkish content; match the language list to it
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['tr-TR', 'tr', 'en-US', 'en'],
        configurable: true
    });
    "#,
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
];
