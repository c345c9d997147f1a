use std::time::Duration;

/// The `User-Agent` header to send when issuing HTTP requests.
pub const HTTP_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:141.0) Gecko/20100101 Firefox/141.0";

/// The duration before a HTTP request times out.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The fixed fragment returned when a query matches no definitions.
pub const NO_RESULTS_FRAGMENT: &str =
    "<div class=\"b\"><h3><span class=\"notBold\">Aucun résultat trouvé</span></h3></div>";
