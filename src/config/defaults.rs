//! Default values for configuration

/// Default base prefix of the lookup table
pub fn default_table_prefix() -> String {
    "wp_".to_string()
}

/// Default cache lifetime (one day)
pub fn default_cache_ttl_secs() -> u64 {
    86_400
}

/// Default cache capacity
pub fn default_cache_max_entries() -> usize {
    10_000
}

/// Default class token that opts an element out of credit injection
pub fn default_opt_out_class() -> String {
    "aiic-ignore".to_string()
}

/// Default class added to the wrapper around credited images
pub fn default_wrapper_class() -> String {
    "has-caption".to_string()
}

/// Default: skip filtering for REST requests
pub fn default_skip_rest_requests() -> bool {
    true
}

/// Default: skip filtering on admin screens
pub fn default_skip_admin() -> bool {
    true
}

/// Default: skip filtering on search results
pub fn default_skip_search() -> bool {
    true
}

/// Default main site ID
pub fn default_main_site_id() -> u64 {
    1
}

/// Default: uploads are organised in year/month folders
pub fn default_date_bucketed_uploads() -> bool {
    true
}

/// Default home URL of the single configured site
pub fn default_home_url() -> String {
    std::env::var("IMAGE_CREDIT_HOME_URL").unwrap_or_else(|_| "https://example.org".to_string())
}

/// Default site path
pub fn default_site_path() -> String {
    "/".to_string()
}

/// Default upload base URL, derived from the home URL
pub fn default_upload_base_url() -> String {
    format!(
        "{}/wp-content/uploads",
        default_home_url().trim_end_matches('/')
    )
}
