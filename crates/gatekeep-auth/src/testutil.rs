//! In-memory gateway for orchestrator and route tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use gatekeep_core::GatewaySecret;
use gatekeep_kong::{
    Consumer, GatewayAdmin, GatewayError, JwtCredential, KeyAuthCredential, generate_api_key,
};

#[derive(Default)]
struct State {
    next_id: u64,
    consumers: HashMap<String, String>,
    credentials: HashMap<String, (String, String)>,
    api_keys: HashMap<String, String>,
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, u16>,
    linger: usize,
    omit_key_consumer: bool,
}

impl State {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn enter(&mut self, op: &'static str) -> Result<(), GatewayError> {
        self.calls.push(op);
        match self.failures.remove(op) {
            Some(status) => Err(api(status, "injected failure")),
            None => Ok(()),
        }
    }
}

fn api(status: u16, body: &str) -> GatewayError {
    GatewayError::Api {
        status,
        body: body.to_string(),
    }
}

fn not_found() -> GatewayError {
    api(404, r#"{"message":"Not found"}"#)
}

/// Gateway double with Kong's not-found and cascade semantics.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<State>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Operations invoked so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make the next call of `op` fail with `status`.
    pub fn fail_next(&self, op: &'static str, status: u16) {
        self.state().failures.insert(op, status);
    }

    /// Report deleted consumers as present for the next `probes` probes.
    pub fn linger_probes(&self, probes: usize) {
        self.state().linger = probes;
    }

    pub fn omit_key_consumer(&self, omit: bool) {
        self.state().omit_key_consumer = omit;
    }

    pub fn consumer_id(&self, identity: &str) -> Option<String> {
        self.state().consumers.get(identity).cloned()
    }

    /// Key-auth credentials currently bound to the identity's consumer.
    pub fn api_key_count(&self, identity: &str) -> usize {
        self.state()
            .api_keys
            .values()
            .filter(|owner| *owner == identity)
            .count()
    }
}

#[async_trait]
impl GatewayAdmin for FakeGateway {
    async fn create_consumer(&self, identity: &str) -> Result<Consumer, GatewayError> {
        let mut state = self.state();
        state.enter("create_consumer")?;
        if state.consumers.contains_key(identity) {
            return Err(api(409, "unique constraint violation"));
        }
        let id = state.next("consumer");
        state.consumers.insert(identity.to_string(), id.clone());
        Ok(Consumer {
            id,
            username: identity.to_string(),
        })
    }

    async fn consumer_exists(&self, identity: &str) -> Result<bool, GatewayError> {
        let mut state = self.state();
        state.enter("consumer_exists")?;
        if state.linger > 0 {
            state.linger -= 1;
            return Ok(true);
        }
        Ok(state.consumers.contains_key(identity))
    }

    async fn delete_consumer(&self, identity: &str) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.enter("delete_consumer")?;
        if state.consumers.remove(identity).is_none() {
            return Err(not_found());
        }
        state.credentials.retain(|_, (owner, _)| owner != identity);
        state.api_keys.retain(|_, owner| owner != identity);
        Ok(())
    }

    async fn create_credential(&self, identity: &str) -> Result<JwtCredential, GatewayError> {
        let mut state = self.state();
        state.enter("create_credential")?;
        let consumer_id = state
            .consumers
            .get(identity)
            .cloned()
            .ok_or_else(not_found)?;
        let id = state.next("credential");
        let secret = state.next("secret");
        state
            .credentials
            .insert(id.clone(), (identity.to_string(), secret.clone()));
        Ok(JwtCredential {
            id,
            key: identity.to_string(),
            consumer_id: Some(consumer_id),
            secret: GatewaySecret::new(secret),
        })
    }

    async fn delete_credential(
        &self,
        identity: &str,
        credential_id: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.enter("delete_credential")?;
        let owned = state
            .credentials
            .get(credential_id)
            .is_some_and(|(owner, _)| owner == identity);
        if !owned {
            return Err(not_found());
        }
        state.credentials.remove(credential_id);
        Ok(())
    }

    async fn fetch_credential_secret(
        &self,
        credential_id: &str,
    ) -> Result<GatewaySecret, GatewayError> {
        let mut state = self.state();
        state.enter("fetch_credential_secret")?;
        state
            .credentials
            .get(credential_id)
            .map(|(_, secret)| GatewaySecret::new(secret.clone()))
            .ok_or_else(not_found)
    }

    async fn create_api_key(&self, identity: &str) -> Result<KeyAuthCredential, GatewayError> {
        let mut state = self.state();
        state.enter("create_api_key")?;
        let consumer_id = state
            .consumers
            .get(identity)
            .cloned()
            .ok_or_else(not_found)?;
        let id = state.next("key-auth");
        let key = generate_api_key();
        state.api_keys.insert(key.clone(), identity.to_string());
        Ok(KeyAuthCredential {
            id: Some(id),
            key,
            consumer_id: (!state.omit_key_consumer).then_some(consumer_id),
        })
    }
}
