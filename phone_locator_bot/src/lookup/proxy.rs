use std::sync::Mutex;

/// Credentials for an authenticated proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// One egress proxy. `None` in the rotation list means direct connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        let mut proxy = reqwest::Proxy::all(format!("http://{}:{}", self.host, self.port))?;
        if let Some(auth) = &self.auth {
            proxy = proxy.basic_auth(&auth.username, &auth.password);
        }
        Ok(proxy)
    }
}

struct RotationState {
    proxies: Vec<Option<ProxyConfig>>,
    index: usize,
}

/// Rotation over the configured proxies. Slot 0 is always the direct
/// connection and is only returned to via `reset` (or when no proxies
/// are configured at all). Safe to update while lookups are in flight;
/// a swap only affects picks made after it.
pub struct ProxyRotator {
    state: Mutex<RotationState>,
}

impl ProxyRotator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RotationState {
                proxies: vec![None],
                index: 0,
            }),
        }
    }

    /// Advance to the next proxy and return it.
    pub fn next(&self) -> Option<ProxyConfig> {
        let mut state = self.state.lock().expect("proxy rotation lock poisoned");
        state.index += 1;
        if state.index >= state.proxies.len() {
            // Wrap around past the direct-connection slot while actual
            // proxies exist; land on it only when the list is bare.
            state.index = usize::from(state.proxies.len() > 1);
        }
        state.proxies[state.index].clone()
    }

    /// Go back to the direct connection.
    pub fn reset(&self) -> Option<ProxyConfig> {
        let mut state = self.state.lock().expect("proxy rotation lock poisoned");
        state.index = 0;
        state.proxies[0].clone()
    }

    /// Swap in a new proxy list, keeping direct connection as slot 0.
    pub fn replace_all(&self, proxies: Vec<ProxyConfig>) {
        let mut state = self.state.lock().expect("proxy rotation lock poisoned");
        log::info!("Updated proxy rotation with {} proxies", proxies.len());
        state.proxies = std::iter::once(None)
            .chain(proxies.into_iter().map(Some))
            .collect();
        state.index = 0;
    }

    pub fn current_index(&self) -> usize {
        self.state.lock().expect("proxy rotation lock poisoned").index
    }
}

impl Default for ProxyRotator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(host: &str) -> ProxyConfig {
        ProxyConfig {
            host: host.to_string(),
            port: 8080,
            auth: None,
        }
    }

    #[test]
    fn empty_rotation_stays_direct() {
        let rotator = ProxyRotator::new();
        assert_eq!(rotator.next(), None);
        assert_eq!(rotator.next(), None);
        assert_eq!(rotator.current_index(), 0);
    }

    #[test]
    fn rotation_skips_direct_until_reset() {
        let rotator = ProxyRotator::new();
        rotator.replace_all(vec![proxy("p1"), proxy("p2")]);

        assert_eq!(rotator.next(), Some(proxy("p1")));
        assert_eq!(rotator.next(), Some(proxy("p2")));
        // Wrapping around goes back to the first proxy, not to direct.
        assert_eq!(rotator.next(), Some(proxy("p1")));

        assert_eq!(rotator.reset(), None);
        assert_eq!(rotator.current_index(), 0);
    }

    #[test]
    fn replace_all_resets_position() {
        let rotator = ProxyRotator::new();
        rotator.replace_all(vec![proxy("p1"), proxy("p2")]);
        rotator.next();
        rotator.next();

        rotator.replace_all(vec![proxy("p3")]);
        assert_eq!(rotator.current_index(), 0);
        assert_eq!(rotator.next(), Some(proxy("p3")));
        assert_eq!(rotator.next(), Some(proxy("p3")));
    }
}
