//! Accounts, labels and the key-value entity.

use lix_refs::GLOBAL_VERSION_ID;
use lix_schema::builtin::{keys, ACCOUNT, ACTIVE_ACCOUNT, LABEL};
use lix_state::StateFilter;
use lix_types::VersionId;
use serde_json::{json, Value};
use tracing::info;

use crate::entities::{Account, ActiveAccount, KeyValue, Label};
use crate::error::{LixError, LixResult};
use crate::transaction::{Transaction, WriteTarget};

impl Transaction<'_> {
    // ---- Accounts ----

    /// Create an account with a generated id.
    pub fn create_account(&mut self, name: &str) -> LixResult<Account> {
        let key = self.insert_entity(ACCOUNT, json!({ "name": name }), &global(), false)?;
        self.get::<Account>(key.key.entity_id.as_str())?
            .ok_or_else(|| LixError::not_found("account", &key.key.entity_id))
    }

    pub fn accounts(&self) -> LixResult<Vec<Account>> {
        self.all()
    }

    pub fn active_accounts(&self) -> LixResult<Vec<Account>> {
        let active: Vec<ActiveAccount> = self.all()?;
        let mut out = Vec::with_capacity(active.len());
        for marker in active {
            if let Some(account) = self.get::<Account>(&marker.account_id)? {
                out.push(account);
            }
        }
        Ok(out)
    }

    /// Make `account_id` the only active account. The previous markers are
    /// deleted before the new one is written, in this transaction.
    pub fn switch_account(&mut self, account_id: &str) -> LixResult<()> {
        if self.get::<Account>(account_id)?.is_none() {
            return Err(LixError::not_found("account", account_id));
        }
        let global_id = VersionId::new(GLOBAL_VERSION_ID);
        let markers = self
            .db
            .resolved_rows(&StateFilter::version(global_id.clone()).with_schema(ACTIVE_ACCOUNT))?;
        for row in markers {
            let key = row.key.in_version(&global_id);
            self.delete_entity(&key, &global())?;
        }
        self.insert_entity(
            ACTIVE_ACCOUNT,
            json!({ "account_id": account_id }),
            &global(),
            false,
        )?;
        info!(account = %account_id, "switched active account");
        Ok(())
    }

    // ---- Labels ----

    pub fn create_label(&mut self, name: &str) -> LixResult<Label> {
        let key = self.insert_entity(LABEL, json!({ "name": name }), &global(), false)?;
        self.get::<Label>(key.key.entity_id.as_str())?
            .ok_or_else(|| LixError::not_found("label", &key.key.entity_id))
    }

    pub fn labels(&self) -> LixResult<Vec<Label>> {
        self.all()
    }

    // ---- Key-value ----

    pub fn key_value(&self, key: &str) -> LixResult<Option<Value>> {
        Ok(self.get::<KeyValue>(key)?.map(|kv| kv.value))
    }

    pub fn set_key_value(&mut self, key: &str, value: Value) -> LixResult<()> {
        self.upsert(&KeyValue {
            key: key.to_string(),
            value,
        })?;
        Ok(())
    }

    /// The database's display name.
    pub fn lix_name(&self) -> LixResult<Option<String>> {
        Ok(self
            .key_value(keys::LIX_NAME)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}

fn global() -> WriteTarget {
    WriteTarget::version(VersionId::new(GLOBAL_VERSION_ID))
}
