//! Transport-agnostic request capability.
//!
//! The payment gate reads requests only through [`HttpAdapter`], so host
//! frameworks that do not speak `http::Request` can still sit behind the
//! gate by implementing these seven accessors.

use http::Request;

/// Read-only view of an incoming HTTP request.
pub trait HttpAdapter {
    /// Returns a header value as a UTF-8 string, if present and valid.
    fn get_header(&self, name: &str) -> Option<&str>;
    /// Returns the request method (e.g., "GET").
    fn get_method(&self) -> &str;
    /// Returns the request path.
    fn get_path(&self) -> &str;
    /// Returns the full request URI as sent by the client.
    fn get_url(&self) -> String;
    /// Returns a query parameter value, if present.
    fn get_query_param(&self, name: &str) -> Option<String>;
    /// Returns the `User-Agent` header, if present.
    fn get_user_agent(&self) -> Option<&str> {
        self.get_header("user-agent")
    }
    /// Returns the `Accept` header, if present.
    fn get_accept_header(&self) -> Option<&str> {
        self.get_header("accept")
    }
}

impl<B> HttpAdapter for Request<B> {
    fn get_header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    fn get_method(&self) -> &str {
        self.method().as_str()
    }

    fn get_path(&self) -> &str {
        self.uri().path()
    }

    fn get_url(&self) -> String {
        self.uri().to_string()
    }

    fn get_query_param(&self, name: &str) -> Option<String> {
        let query = self.uri().query()?;
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_owned())
        })
    }
}
