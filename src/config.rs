use std::time::Duration;

/// Site-wide settings shared by every page component.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    // Analytics
    pub measurement_id: String,
    pub tag_script_url: String,
    pub contact_phone: String,
    pub contact_email: String,

    // Paths
    pub path_prefix: String,
    pub base_url: String,
    pub github_pages_host: String,

    // Timing
    pub fade_midpoint: Duration,
    pub banner_hide_delay: Duration,
    pub scroll_depth_throttle: Duration,
    pub sticky_nav_throttle: Duration,
    pub smooth_scroll_duration: Duration,

    // Loading screen
    pub loading_min_time: Duration,
    pub loading_ceiling: Duration,
    pub loading_transition: Duration,
    pub loading_removal: Duration,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            measurement_id: "G-PB3G5YR15S".to_string(),
            tag_script_url: "https://www.googletagmanager.com/gtag/js".to_string(),
            contact_phone: "+381612003932".to_string(),
            contact_email: "caffeart@gmail.com".to_string(),

            path_prefix: String::new(),
            base_url: "/".to_string(),
            github_pages_host: "petarplecas.github.io".to_string(),

            fade_midpoint: Duration::from_millis(150),
            banner_hide_delay: Duration::from_millis(500),
            scroll_depth_throttle: Duration::from_millis(1000),
            sticky_nav_throttle: Duration::from_millis(100),
            smooth_scroll_duration: Duration::from_millis(1000),

            loading_min_time: Duration::from_millis(1500),
            loading_ceiling: Duration::from_secs(5),
            loading_transition: Duration::from_millis(1000),
            loading_removal: Duration::from_millis(800),
        }
    }
}

impl SiteConfig {
    /// Build a config from the defaults, overridden by `CAFFE_ART_*` variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            measurement_id: std::env::var("CAFFE_ART_MEASUREMENT_ID")
                .unwrap_or(defaults.measurement_id),
            tag_script_url: std::env::var("CAFFE_ART_TAG_SCRIPT_URL")
                .unwrap_or(defaults.tag_script_url),
            path_prefix: std::env::var("CAFFE_ART_PATH_PREFIX").unwrap_or(defaults.path_prefix),
            base_url: std::env::var("CAFFE_ART_BASE_URL").unwrap_or(defaults.base_url),
            fade_midpoint: std::env::var("CAFFE_ART_FADE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.fade_midpoint),
            ..defaults
        }
    }

    /// URL of the third-party tag loader for the configured property.
    pub fn tag_script_src(&self) -> String {
        format!("{}?id={}", self.tag_script_url, self.measurement_id)
    }
}
