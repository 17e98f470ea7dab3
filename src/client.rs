use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use serde_json::{Value, json};
use tracing::{debug, trace, warn};

use crate::capabilities::Capabilities;
use crate::command::{Command, EncodeContext, normalize, plan_commands, validate};
use crate::diff::StateTracker;
use crate::model::UnitModel;
use crate::protocol::{
    DEFAULT_BASE_URL, Endpoint, Session, capabilities_params, command_params, endpoint_url,
    is_session_error, local_code, local_command_body, local_url, login_params,
    parse_login_response, response_error, state_params,
};
use crate::store::{FileStore, SNAPSHOT_VERSION, Snapshot, StateStore};
use crate::types::*;
use crate::{Error, Result};

type ChangeCallback = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

const DEFAULT_MIN_REFRESH: Duration = Duration::from_secs(60);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One heat pump on the account.
#[derive(Debug, Clone)]
pub struct Unit {
    index: usize,
    capabilities: Capabilities,
    model: UnitModel,
    offset: f64,
    tracker: StateTracker,
}

impl Unit {
    fn new(index: usize, capabilities: Capabilities, tracking: bool) -> Self {
        Self::restore(index, capabilities, None, 0.0, tracking)
    }

    fn restore(
        index: usize,
        capabilities: Capabilities,
        state: Option<RawState>,
        offset: f64,
        tracking: bool,
    ) -> Self {
        let model = UnitModel::resolve(&capabilities);
        Self {
            index,
            capabilities,
            model,
            offset,
            tracker: StateTracker::with_state(tracking, state),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> &str {
        &self.capabilities.id
    }

    pub fn name(&self) -> &str {
        &self.capabilities.unitname
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn model(&self) -> &UnitModel {
        &self.model
    }

    /// Correction added to every temperature read and removed from every
    /// temperature written.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn local_address(&self) -> Option<&str> {
        self.capabilities.localip.as_deref()
    }

    pub fn raw_state(&self) -> Option<&RawState> {
        self.tracker.current()
    }

    pub fn state(&self) -> Option<UnitState> {
        self.raw_state()
            .map(|raw| normalize(&self.model, raw, self.offset))
    }

    fn encode_context(&self) -> EncodeContext<'_> {
        EncodeContext {
            model: &self.model,
            capabilities: &self.capabilities,
            offset: self.offset,
        }
    }
}

pub struct MelviewClientBuilder {
    username: String,
    password: String,
    base_url: String,
    user_agent: Option<String>,
    min_refresh: Duration,
    timeout: Duration,
    store: Option<Box<dyn StateStore>>,
    track_changes: bool,
    change_callbacks: Vec<ChangeCallback>,
    local_commands: bool,
}

impl MelviewClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
            min_refresh: DEFAULT_MIN_REFRESH,
            timeout: DEFAULT_TIMEOUT,
            store: None,
            track_changes: false,
            change_callbacks: Vec::new(),
            local_commands: false,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// How long a fetched state is served from cache.
    pub fn min_refresh(mut self, age: Duration) -> Self {
        self.min_refresh = age;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Persist session, capabilities and state to a JSON file.
    pub fn state_file(self, path: impl Into<std::path::PathBuf>) -> Self {
        self.store(FileStore::new(path))
    }

    pub fn store(mut self, store: impl StateStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn track_changes(mut self, enabled: bool) -> Self {
        self.track_changes = enabled;
        self
    }

    /// Called with every externally caused change. Enables change tracking.
    pub fn on_change(mut self, f: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Self {
        self.change_callbacks.push(Box::new(f));
        self.track_changes = true;
        self
    }

    /// Also push each command straight to the unit over the LAN.
    pub fn local_commands(mut self, enabled: bool) -> Self {
        self.local_commands = enabled;
        self
    }

    pub fn build(self) -> MelviewClient {
        let mut http = reqwest::Client::builder().timeout(self.timeout);
        if let Some(agent) = &self.user_agent {
            http = http.user_agent(agent.clone());
        }
        let http = http.build().expect("failed to build HTTP client");

        MelviewClient {
            http,
            username: self.username,
            password: self.password,
            base_url: self.base_url,
            min_refresh: self.min_refresh,
            store: self.store,
            track_changes: self.track_changes,
            change_callbacks: self.change_callbacks,
            local_commands: self.local_commands,
            session: Session::default(),
            units: Vec::new(),
            connected: false,
        }
    }
}

/// Stateful Melview account client.
///
/// Every operation that touches a unit takes `&mut self`, so calls against
/// one client are serialized. Share it across tasks behind a mutex.
pub struct MelviewClient {
    http: reqwest::Client,
    username: String,
    password: String,
    base_url: String,
    min_refresh: Duration,
    store: Option<Box<dyn StateStore>>,
    track_changes: bool,
    change_callbacks: Vec<ChangeCallback>,
    local_commands: bool,
    session: Session,
    units: Vec<Unit>,
    connected: bool,
}

impl MelviewClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> MelviewClientBuilder {
        MelviewClientBuilder::new(username, password)
    }

    /// Log in and discover units, or resume a persisted session when `reuse`
    /// is set and a usable snapshot exists.
    pub async fn connect(&mut self, reuse: bool) -> Result<()> {
        let loaded = match &self.store {
            Some(store) if reuse => Some(store.load().and_then(|snapshot| {
                snapshot.check()?;
                Ok(snapshot)
            })),
            _ => None,
        };
        match loaded {
            Some(Ok(snapshot)) => {
                self.restore(snapshot);
                self.connected = true;
                debug!(units = self.units.len(), "resumed persisted session");
                return Ok(());
            }
            Some(Err(e)) => {
                warn!(error = %e, "discarding persisted session");
                if let Some(store) = &self.store
                    && let Err(e) = store.clear()
                {
                    warn!(error = %e, "failed to clear persisted session");
                }
            }
            None => {}
        }

        self.connected = false;
        let count = self.login().await?;
        self.bootstrap(count).await?;
        self.connected = true;
        self.persist();
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<()> {
        let result = if self.connected {
            self.call_api(Endpoint::Logout, json!({})).await.map(|_| ())
        } else {
            Ok(())
        };

        self.connected = false;
        self.session = Session::default();
        self.units.clear();
        if let Some(store) = &self.store
            && let Err(e) = store.clear()
        {
            warn!(error = %e, "failed to clear persisted session");
        }
        debug!("logged out");
        result
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    pub fn unit(&self, index: usize) -> Result<&Unit> {
        self.units.get(index).ok_or(Error::InvalidUnit(index))
    }

    pub fn capabilities(&self, index: usize) -> Result<&Capabilities> {
        self.unit(index).map(|u| u.capabilities())
    }

    pub fn model(&self, index: usize) -> Result<&UnitModel> {
        self.unit(index).map(|u| u.model())
    }

    /// Normalized state, refreshed from the API when the cache is older than
    /// `min_refresh`.
    pub async fn current_state(&mut self, index: usize) -> Result<UnitState> {
        self.ensure_fresh(index).await?;
        self.cached_state(index)
            .ok_or_else(|| Error::Api(format!("no state for unit {index}")))
    }

    /// State exactly as the API last returned it. Same freshness rules as
    /// [`Self::current_state`].
    pub async fn current_state_raw(&mut self, index: usize) -> Result<RawState> {
        self.ensure_fresh(index).await?;
        self.cached_state_raw(index)
            .cloned()
            .ok_or_else(|| Error::Api(format!("no state for unit {index}")))
    }

    pub fn cached_state(&self, index: usize) -> Option<UnitState> {
        self.units.get(index).and_then(|u| u.state())
    }

    pub fn cached_state_raw(&self, index: usize) -> Option<&RawState> {
        self.units.get(index).and_then(|u| u.raw_state())
    }

    /// Fetch state now, regardless of cache age.
    pub async fn refresh(&mut self, index: usize) -> Result<()> {
        self.ensure_connected()?;
        self.unit(index)?;
        self.fetch_state(index).await?;
        self.persist();
        Ok(())
    }

    // -- Command methods --

    pub async fn set_power(&mut self, index: usize, power: &str) -> Result<()> {
        self.set_state(
            index,
            DesiredState {
                power: Some(power.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Set the operating mode. The current temperature is pulled into the new
    /// mode's range first when needed.
    pub async fn set_mode(&mut self, index: usize, mode: &str) -> Result<()> {
        self.set_state(
            index,
            DesiredState {
                mode: Some(mode.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Set the target temperature, as displayed (offset included). Clamped to
    /// the current mode's range.
    pub async fn set_temperature(&mut self, index: usize, temperature: f64) -> Result<()> {
        self.set_state(
            index,
            DesiredState {
                set_temperature: Some(temperature),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_fan_speed(&mut self, index: usize, speed: &str) -> Result<()> {
        self.set_state(
            index,
            DesiredState {
                fan_speed: Some(speed.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_air_direction_v(&mut self, index: usize, direction: &str) -> Result<()> {
        self.set_state(
            index,
            DesiredState {
                air_direction_v: Some(direction.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_air_direction_h(&mut self, index: usize, direction: &str) -> Result<()> {
        self.set_state(
            index,
            DesiredState {
                air_direction_h: Some(direction.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Apply every property set in `desired`, sending only what differs from
    /// the unit's current state.
    pub async fn set_state(&mut self, index: usize, desired: DesiredState) -> Result<()> {
        self.ensure_connected()?;
        validate(self.unit(index)?.model(), &desired)?;
        self.ensure_fresh(index).await?;

        let unit = self.unit(index)?;
        let current = unit
            .raw_state()
            .ok_or_else(|| Error::Api(format!("no state for unit {index}")))?;
        let commands = plan_commands(unit.encode_context(), current, &desired)?;

        if commands.is_empty() {
            trace!(unit = index, "state already matches, nothing to send");
            return Ok(());
        }

        for command in &commands {
            self.send_command(index, command).await?;
            self.persist();
        }
        Ok(())
    }

    pub fn set_temperature_offset(&mut self, index: usize, offset: f64) -> Result<()> {
        if !offset.is_finite() {
            return Err(Error::InvalidValue(format!("offset {offset}")));
        }
        let unit = self.units.get_mut(index).ok_or(Error::InvalidUnit(index))?;
        unit.offset = offset;
        debug!(unit = index, offset, "temperature offset set");
        self.persist();
        Ok(())
    }

    // -- Helpers --

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn ensure_fresh(&mut self, index: usize) -> Result<()> {
        self.ensure_connected()?;
        if self.unit(index)?.tracker.is_fresh(Utc::now(), self.min_refresh) {
            trace!(unit = index, "serving cached state");
            return Ok(());
        }
        self.fetch_state(index).await?;
        self.persist();
        Ok(())
    }

    async fn login(&mut self) -> Result<usize> {
        self.session = Session::default();
        let params = login_params(&self.username, &self.password);
        let response = self.call_api(Endpoint::Login, params).await?;
        let count = parse_login_response(&response).ok_or_else(|| {
            Error::Authentication("wrong username/password or no units registered".into())
        })?;
        debug!(units = count, "logged in");
        Ok(count)
    }

    /// Capabilities, then model, then state, per unit.
    async fn bootstrap(&mut self, count: usize) -> Result<()> {
        self.units.clear();
        for index in 0..count {
            let capabilities = self.fetch_capabilities(index).await?;
            debug!(unit = index, id = %capabilities.id, name = %capabilities.unitname, "discovered unit");
            self.units
                .push(Unit::new(index, capabilities, self.track_changes));
            self.fetch_state(index).await?;
        }
        Ok(())
    }

    async fn fetch_capabilities(&mut self, index: usize) -> Result<Capabilities> {
        let response = self
            .call_api(Endpoint::UnitCapabilities, capabilities_params(index))
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn fetch_state(&mut self, index: usize) -> Result<()> {
        let unit_id = self.unit(index)?.id().to_string();
        let response = self
            .call_api(Endpoint::UnitCommand, state_params(&unit_id))
            .await?;

        let unit = &mut self.units[index];
        let changes = unit
            .tracker
            .record_fetch(RawState::from_response(response), &unit.model, unit.offset);

        if let Some((previous, current)) = changes {
            let event = ChangeEvent {
                unit_index: index,
                unit_id,
                previous,
                current,
            };
            debug!(unit = index, changed = event.current.len().max(event.previous.len()), "unit changed externally");
            for cb in &self.change_callbacks {
                cb(&event);
            }
        }
        Ok(())
    }

    async fn send_command(&mut self, index: usize, command: &Command) -> Result<()> {
        let wire = command.to_string();
        let unit_id = self.unit(index)?.id().to_string();
        debug!(unit = index, command = %wire, "sending command");

        let response = self
            .call_api(Endpoint::UnitCommand, command_params(&unit_id, &wire))
            .await?;
        let code = local_code(&response).map(str::to_string);
        self.units[index]
            .tracker
            .record_command(RawState::from_response(response));

        if self.local_commands
            && let Some(code) = code
        {
            self.send_local(index, &code).await;
        }
        Ok(())
    }

    /// Best effort: the cloud already accepted the command.
    async fn send_local(&mut self, index: usize, code: &str) {
        if self.units[index].local_address().is_none() {
            match self.fetch_capabilities(index).await {
                Ok(fresh) => self.units[index].capabilities.localip = fresh.localip,
                Err(e) => {
                    warn!(unit = index, error = %e, "could not resolve local address");
                    return;
                }
            }
        }
        let Some(address) = self.units[index].local_address().map(str::to_string) else {
            debug!(unit = index, "unit has no local address");
            return;
        };

        let url = local_url(&address);
        debug!(unit = index, url = %url, "sending local command");
        let result = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/xml")
            .body(local_command_body(code))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            warn!(unit = index, url = %url, error = %e, "local command failed");
        }
    }

    async fn call_api(&mut self, endpoint: Endpoint, params: Value) -> Result<Value> {
        let url = endpoint_url(&self.base_url, endpoint);
        debug!(url = %url, "calling Melview API");

        let mut request = self.http.post(&url).json(&params);
        if let Some(cookie) = self.session.cookie_header() {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await?;

        for header in response.headers().get_all(SET_COOKIE) {
            if let Ok(value) = header.to_str() {
                self.session.absorb_set_cookie(value);
            }
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication(format!("HTTP {status}")));
        }
        let body = response.error_for_status()?.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        let parsed: Value = serde_json::from_str(&body)?;
        match response_error(&parsed) {
            Some(msg) if is_session_error(msg) => Err(Error::Authentication(msg.to_string())),
            Some(msg) => Err(Error::Api(msg.to_string())),
            None => Ok(parsed),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            session: self.session.clone(),
            capabilities: self.units.iter().map(|u| u.capabilities.clone()).collect(),
            state: self.units.iter().map(|u| u.raw_state().cloned()).collect(),
            offsets: self.units.iter().map(|u| u.offset).collect(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        let Snapshot {
            session,
            capabilities,
            state,
            offsets,
            ..
        } = snapshot;
        self.session = session;
        self.units = capabilities
            .into_iter()
            .enumerate()
            .map(|(i, caps)| {
                Unit::restore(
                    i,
                    caps,
                    state.get(i).cloned().flatten(),
                    offsets.get(i).copied().unwrap_or(0.0),
                    self.track_changes,
                )
            })
            .collect();
    }

    /// Failures are logged; a failed save never fails the operation that
    /// triggered it.
    fn persist(&self) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(&self.snapshot())
        {
            warn!(error = %e, "failed to persist session");
        }
    }
}
