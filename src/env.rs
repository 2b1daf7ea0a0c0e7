lazy_static::lazy_static! {
    /// Host name of the application. The web server only listens to request with a matching host name.
    ///
    /// Field name: `API_HOST`
    pub static ref API_HOST: String = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());

    /// The application port.
    ///
    /// Field name: `API_PORT`
    pub static ref API_PORT: String = std::env::var("API_PORT").unwrap_or_else(|_| "3000".to_owned());

    /// Database connection string.
    ///
    /// Field name: `DATABASE_URL`
    pub static ref DATABASE_URL: String = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://point-ledger.db".to_owned());
}
