use crate::store::{CookieChannel, KeyValueSlot, SessionCookie, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;

//--------------------------------------------------------------------------------------------------
// In-memory slot
//--------------------------------------------------------------------------------------------------

#[derive(Default, Debug)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl KeyValueSlot for MemorySlot {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// In-memory cookie channel
//--------------------------------------------------------------------------------------------------

/// Keeps whole cookies so their attributes can be inspected.
#[derive(Default, Debug)]
pub struct MemoryCookies {
    cookies: Mutex<HashMap<String, SessionCookie>>,
}

impl MemoryCookies {
    pub fn stored(&self, name: &str) -> Option<SessionCookie> {
        self.cookies.lock().get(name).cloned()
    }
}

impl CookieChannel for MemoryCookies {
    fn set_cookie(&self, cookie: &SessionCookie) {
        let mut cookies = self.cookies.lock();
        if cookie.max_age == 0 {
            cookies.remove(&cookie.name);
        } else {
            cookies.insert(cookie.name.clone(), cookie.clone());
        }
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().get(name).map(|c| c.value.clone())
    }

    fn expire(&self, name: &str) {
        self.set_cookie(&SessionCookie::expired(name));
    }
}
