use redis::{Client, Commands, Connection, RedisError};

#[derive(thiserror::Error, Debug)]
pub enum DBError {
    #[error("Redis operation error: {0}")]
    RedisError(RedisError),
    #[error("Corrupt entry at {key}: {reason}")]
    CorruptEntry { key: String, reason: String },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<RedisError> for DBError {
    fn from(redis_error: RedisError) -> DBError {
        DBError::RedisError(redis_error)
    }
}

// Opens a client for the given URL. Does not connect yet.
pub fn open(redis_url: &str) -> Result<Client, DBError> {
    Ok(Client::open(redis_url)?)
}

// Gets a fresh connection from the client
pub fn connect(client: &Client) -> Result<Connection, DBError> {
    Ok(client.get_connection()?)
}

// Tests connection to Redis
pub fn test_redis_connection(client: &Client) -> Result<bool, DBError> {
    let mut con = connect(client)?;
    let _: () = con.set("panelbot:ping", 42)?;
    let res: i32 = con.get("panelbot:ping")?;
    let _: () = con.del("panelbot:ping")?;

    Ok(res == 42)
}
