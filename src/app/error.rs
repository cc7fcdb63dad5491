use diesel_async::pooled_connection::deadpool;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("diesel error {0}")]
    Diesel(#[from] diesel::result::Error),
    #[error("deadpool error {0}")]
    Deadpool(#[from] deadpool::PoolError),
    #[error("failed to build database connection pool {0}")]
    PoolBuild(#[from] deadpool::BuildError),
    /// Not a `#[from]`: without argon2's `std` feature the hash error is no `std::error::Error`.
    #[error("argon2 password hash error {0}")]
    Argon2(argon2::password_hash::Error),
    #[error("invalid email address {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("error building email {0}")]
    Email(#[from] lettre::error::Error),
    #[error("error writing email to file {0}")]
    FileTransport(#[from] lettre::transport::file::Error),
    #[error("I/O error {0}")]
    Io(#[from] std::io::Error),
    #[error("username {0} is already taken")]
    UsernameTaken(String),
    #[error("category slug {0} is already taken")]
    SlugTaken(String),
    #[error("{0} does not exist")]
    Missing(&'static str),
}

impl From<argon2::password_hash::Error> for Error {
    fn from(e: argon2::password_hash::Error) -> Self {
        Error::Argon2(e)
    }
}
