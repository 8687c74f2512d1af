use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::auth::{ChallengeData, Store};
use crate::core::models::{AccessTokenData, AuthCodeData, Client, RefreshTokenData};
use crate::core::types::{ChallengeId, ClientId, HashedAuthCode, HashedToken};
use crate::provider::error::Error;

/// All OP state lives here. Single-use rows (codes, challenges, refresh
/// tokens) are consumed with `remove` under the table's write lock, so two
/// concurrent redemptions cannot both succeed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    clients: RwLock<HashMap<ClientId, Client>>,
    codes: RwLock<HashMap<HashedAuthCode, AuthCodeData>>,
    challenges: RwLock<HashMap<ChallengeId, ChallengeData>>,
    access_tokens: RwLock<HashMap<HashedToken, AccessTokenData>>,
    refresh_tokens: RwLock<HashMap<HashedToken, RefreshTokenData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get_client(&self, client_id: &ClientId) -> Result<Option<Client>, Error> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }

    async fn put_client(&self, client: Client) -> Result<(), Error> {
        self.clients.write().await.insert(client.id.clone(), client);
        Ok(())
    }

    async fn store_code(&self, data: AuthCodeData) -> Result<(), Error> {
        self.codes.write().await.insert(data.code.clone(), data);
        Ok(())
    }

    async fn take_authcode_data(
        &self,
        client_id: &ClientId,
        code: &HashedAuthCode,
        now: u64,
    ) -> Result<AuthCodeData, Error> {
        let data = self
            .codes
            .write()
            .await
            .remove(code)
            .ok_or(Error::NotFound)?;

        if data.expires_at.is_expired(now) {
            return Err(Error::Expired);
        }
        if &data.client_id != client_id {
            return Err(Error::NotFound);
        }
        Ok(data)
    }

    async fn store_challenge_data(&self, data: ChallengeData) -> Result<ChallengeId, Error> {
        let id = data.id.clone();
        self.challenges.write().await.insert(id.clone(), data);
        Ok(id)
    }

    async fn get_challenge_data(
        &self,
        id: &ChallengeId,
        now: u64,
    ) -> Result<Option<ChallengeData>, Error> {
        let challenges = self.challenges.read().await;
        Ok(challenges
            .get(id)
            .filter(|c| !c.expires_at.is_expired(now))
            .cloned())
    }

    async fn take_challenge_data(
        &self,
        id: &ChallengeId,
        now: u64,
    ) -> Result<ChallengeData, Error> {
        let data = self
            .challenges
            .write()
            .await
            .remove(id)
            .ok_or(Error::NotFound)?;

        if data.expires_at.is_expired(now) {
            return Err(Error::Expired);
        }
        Ok(data)
    }

    async fn put_access_token(
        &self,
        token: HashedToken,
        data: AccessTokenData,
    ) -> Result<(), Error> {
        self.access_tokens.write().await.insert(token, data);
        Ok(())
    }

    async fn get_access_token(
        &self,
        token: &HashedToken,
        now: u64,
    ) -> Result<Option<AccessTokenData>, Error> {
        let tokens = self.access_tokens.read().await;
        Ok(tokens
            .get(token)
            .filter(|t| !t.expires_at.is_expired(now))
            .cloned())
    }

    async fn put_refresh_token(
        &self,
        token: HashedToken,
        data: RefreshTokenData,
    ) -> Result<(), Error> {
        self.refresh_tokens.write().await.insert(token, data);
        Ok(())
    }

    async fn take_refresh_token(
        &self,
        token: &HashedToken,
        now: u64,
    ) -> Result<RefreshTokenData, Error> {
        let data = self
            .refresh_tokens
            .write()
            .await
            .remove(token)
            .ok_or(Error::NotFound)?;

        if data.expires_at.is_expired(now) {
            return Err(Error::Expired);
        }
        Ok(data)
    }

    async fn clean_up(&self, now: u64) -> Result<(), Error> {
        self.codes
            .write()
            .await
            .retain(|_, data| !data.expires_at.is_expired(now));
        self.challenges
            .write()
            .await
            .retain(|_, data| !data.expires_at.is_expired(now));
        self.access_tokens
            .write()
            .await
            .retain(|_, data| !data.expires_at.is_expired(now));
        self.refresh_tokens
            .write()
            .await
            .retain(|_, data| !data.expires_at.is_expired(now));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Expiry, RedirectUri, Scope};

    fn code_data(code: &str, expires_at: u64) -> AuthCodeData {
        AuthCodeData {
            code: HashedAuthCode(code.to_string()),
            client_id: ClientId("rp-client".to_string()),
            redirect_uri: RedirectUri("http://localhost:3000/callback".to_string()),
            scope: Scope::from_delimited_parts("openid"),
            subject: "alice".to_string(),
            nonce: None,
            pkce_challenge: None,
            auth_time: 0,
            expires_at: Expiry(expires_at),
        }
    }

    #[tokio::test]
    async fn codes_redeem_exactly_once() {
        let store = MemoryStore::new();
        let client_id = ClientId("rp-client".to_string());
        store.store_code(code_data("c1", 600)).await.unwrap();

        let hashed = HashedAuthCode("c1".to_string());
        assert!(store.take_authcode_data(&client_id, &hashed, 10).await.is_ok());
        assert!(matches!(
            store.take_authcode_data(&client_id, &hashed, 10).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let store = MemoryStore::new();
        let client_id = ClientId("rp-client".to_string());
        store.store_code(code_data("c1", 600)).await.unwrap();

        let hashed = HashedAuthCode("c1".to_string());
        assert!(matches!(
            store.take_authcode_data(&client_id, &hashed, 600).await,
            Err(Error::Expired)
        ));
    }

    #[tokio::test]
    async fn code_is_bound_to_client() {
        let store = MemoryStore::new();
        store.store_code(code_data("c1", 600)).await.unwrap();

        let other = ClientId("someone-else".to_string());
        let hashed = HashedAuthCode("c1".to_string());
        assert!(store.take_authcode_data(&other, &hashed, 10).await.is_err());
    }

    #[tokio::test]
    async fn clean_up_sweeps_expired_rows() {
        let store = MemoryStore::new();
        store.store_code(code_data("old", 100)).await.unwrap();
        store.store_code(code_data("new", 1_000)).await.unwrap();

        store.clean_up(500).await.unwrap();

        assert_eq!(store.codes.read().await.len(), 1);
        assert!(store
            .codes
            .read()
            .await
            .contains_key(&HashedAuthCode("new".to_string())));
    }
}
