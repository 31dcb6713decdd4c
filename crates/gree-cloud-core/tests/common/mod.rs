#![allow(dead_code, clippy::unwrap_used)]

//! Scripted stand-ins for the vendor SDK collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gree_cloud_api::{
    CipherVersion, CloudApi, CloudDeviceInfo, Credentials, Device, DeviceFactory, DeviceInfo,
    Error as ApiError, MqttSession, RawProperties,
};
use gree_cloud_core::RuntimeConfig;
use secrecy::SecretString;

pub const MAC_A: &str = "aa:aa:aa:aa:aa:aa";
pub const MAC_B: &str = "bb:bb:bb:bb:bb:bb";
pub const MAC_C: &str = "cc:cc:cc:cc:cc:cc";
pub const MAC_D: &str = "dd:dd:dd:dd:dd:dd";

pub fn props(pairs: &[(&str, i64)]) -> RawProperties {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
}

pub fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        update_interval: Duration::from_secs(60),
        max_errors: 3,
        request_timeout: Duration::from_secs(10),
        cipher_version: CipherVersion::V1,
    }
}

// ── Journal ─────────────────────────────────────────────────────────

/// Ordered record of lifecycle calls across every fake.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// One scripted outcome of a device call.
#[derive(Debug, Clone)]
pub enum Step {
    /// Succeed. For refresh, copies the remote state into the handle.
    Ok,
    /// Fail with a timeout error right away.
    Timeout,
    /// Fail with a device error.
    Fail(&'static str),
    /// Never complete.
    Hang,
}

impl Step {
    async fn run(&self, mac: &str) -> Result<(), ApiError> {
        match self {
            Self::Ok => Ok(()),
            Self::Timeout => Err(ApiError::Timeout { timeout_secs: 10 }),
            Self::Fail(message) => Err(ApiError::Device {
                mac: mac.to_owned(),
                message: (*message).to_owned(),
            }),
            Self::Hang => std::future::pending().await,
        }
    }
}

/// Shared script and call log for one fake device.
#[derive(Debug, Default)]
pub struct DeviceScript {
    pub remote: Mutex<RawProperties>,
    pub hid: Mutex<Option<String>>,
    pub bind: Mutex<Option<Step>>,
    pub updates: Mutex<VecDeque<Step>>,
    pub pushes: Mutex<VecDeque<Step>>,
    pub update_calls: AtomicU32,
    pub push_calls: AtomicU32,
    pub close_calls: AtomicU32,
    /// Handle properties at the moment of each push.
    pub pushed: Mutex<Vec<RawProperties>>,
}

impl DeviceScript {
    pub fn with_state(remote: RawProperties) -> Arc<Self> {
        let script = Self::default();
        *script.remote.lock().unwrap() = remote;
        Arc::new(script)
    }

    pub fn set_remote(&self, remote: RawProperties) {
        *self.remote.lock().unwrap() = remote;
    }

    pub fn set_hid(&self, hid: &str) {
        *self.hid.lock().unwrap() = Some(hid.to_owned());
    }

    pub fn fail_bind(&self, step: Step) {
        *self.bind.lock().unwrap() = Some(step);
    }

    pub fn queue_updates(&self, steps: impl IntoIterator<Item = Step>) {
        self.updates.lock().unwrap().extend(steps);
    }

    pub fn queue_pushes(&self, steps: impl IntoIterator<Item = Step>) {
        self.pushes.lock().unwrap().extend(steps);
    }

    pub fn updates(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> u32 {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn pushed(&self) -> Vec<RawProperties> {
        self.pushed.lock().unwrap().clone()
    }
}

pub struct FakeDevice {
    info: DeviceInfo,
    hid: Option<String>,
    properties: RawProperties,
    script: Arc<DeviceScript>,
    journal: Journal,
}

impl FakeDevice {
    pub fn new(info: DeviceInfo, script: Arc<DeviceScript>, journal: Journal) -> Self {
        Self {
            info,
            hid: None,
            properties: RawProperties::new(),
            script,
            journal,
        }
    }
}

#[async_trait]
impl Device for FakeDevice {
    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn hid(&self) -> Option<&str> {
        self.hid.as_deref()
    }

    fn raw_properties(&self) -> &RawProperties {
        &self.properties
    }

    fn set_property(&mut self, name: &str, value: i64) {
        self.properties.insert(name.to_owned(), value);
    }

    async fn bind(&mut self) -> Result<(), ApiError> {
        self.journal.record(format!("bind:{}", self.info.mac));
        let step = self.script.bind.lock().unwrap().clone().unwrap_or(Step::Ok);
        step.run(&self.info.mac).await
    }

    async fn update_state(&mut self) -> Result<(), ApiError> {
        self.script.update_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .updates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Ok);
        step.run(&self.info.mac).await?;
        self.properties = self.script.remote.lock().unwrap().clone();
        self.hid = self.script.hid.lock().unwrap().clone();
        Ok(())
    }

    async fn push_state_update(&mut self) -> Result<(), ApiError> {
        self.script.push_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .pushed
            .lock()
            .unwrap()
            .push(self.properties.clone());
        let step = self
            .script
            .pushes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Ok);
        step.run(&self.info.mac).await
    }

    async fn close(&mut self) -> Result<(), ApiError> {
        self.script.close_calls.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!("device:close:{}", self.info.mac));
        Ok(())
    }
}

/// Fake device with the given script, for driving a coordinator directly.
pub fn device(mac: &str, name: &str, script: &Arc<DeviceScript>) -> Box<dyn Device> {
    Box::new(FakeDevice::new(
        DeviceInfo::cloud(mac, name),
        Arc::clone(script),
        Journal::default(),
    ))
}

// ── Factory ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeFactory {
    scripts: Mutex<HashMap<String, Arc<DeviceScript>>>,
    reject: Mutex<HashSet<String>>,
    pub journal: Journal,
}

impl FakeFactory {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Script for `mac`, created on first use.
    pub fn script(&self, mac: &str) -> Arc<DeviceScript> {
        Arc::clone(
            self.scripts
                .lock()
                .unwrap()
                .entry(mac.to_owned())
                .or_insert_with(|| DeviceScript::with_state(props(&[("Pow", 1)]))),
        )
    }

    /// Refuse to construct a handle for `mac`.
    pub fn reject(&self, mac: &str) {
        self.reject.lock().unwrap().insert(mac.to_owned());
    }
}

impl DeviceFactory for FakeFactory {
    fn create(
        &self,
        _mqtt: Arc<dyn MqttSession>,
        info: DeviceInfo,
        _key: SecretString,
        _cipher: CipherVersion,
    ) -> Result<Box<dyn Device>, ApiError> {
        if self.reject.lock().unwrap().contains(&info.mac) {
            return Err(ApiError::Device {
                mac: info.mac,
                message: "unsupported device".into(),
            });
        }
        let script = self.script(&info.mac);
        self.journal.record(format!("create:{}", info.mac));
        Ok(Box::new(FakeDevice::new(info, script, self.journal.clone())))
    }
}

// ── Cloud ───────────────────────────────────────────────────────────

pub struct FakeCloud {
    devices: Mutex<Vec<(String, String)>>,
    login: Mutex<Step>,
    listing: Mutex<Step>,
    pub closed: AtomicBool,
    journal: Journal,
}

impl FakeCloud {
    pub fn new(journal: Journal) -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            login: Mutex::new(Step::Ok),
            listing: Mutex::new(Step::Ok),
            closed: AtomicBool::new(false),
            journal,
        }
    }

    pub fn add_device(&self, mac: &str, name: &str) {
        self.devices
            .lock()
            .unwrap()
            .push((mac.to_owned(), name.to_owned()));
    }

    pub fn set_login(&self, step: Step) {
        *self.login.lock().unwrap() = step;
    }

    pub fn set_listing(&self, step: Step) {
        *self.listing.lock().unwrap() = step;
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn login(&self) -> Result<Credentials, ApiError> {
        self.journal.record("cloud:login");
        let step = self.login.lock().unwrap().clone();
        match step {
            Step::Fail(message) => Err(ApiError::Authentication {
                message: message.to_owned(),
            }),
            other => other.run("").await.map(|()| Credentials {
                user_id: "user-1".into(),
                token: SecretString::from("token".to_owned()),
            }),
        }
    }

    async fn get_all_devices(&self) -> Result<Vec<CloudDeviceInfo>, ApiError> {
        let step = self.listing.lock().unwrap().clone();
        step.run("").await?;
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .map(|(mac, name)| {
                CloudDeviceInfo::new(mac.clone(), name.clone(), SecretString::from("key".to_owned()))
            })
            .collect())
    }

    async fn close(&self) -> Result<(), ApiError> {
        self.closed.store(true, Ordering::SeqCst);
        self.journal.record("cloud:close");
        Ok(())
    }
}

// ── MQTT ────────────────────────────────────────────────────────────

pub struct FakeMqtt {
    connect: Mutex<Step>,
    disconnect_fails: AtomicBool,
    disconnect_hangs: AtomicBool,
    journal: Journal,
}

impl FakeMqtt {
    pub fn new(journal: Journal) -> Self {
        Self {
            connect: Mutex::new(Step::Ok),
            disconnect_fails: AtomicBool::new(false),
            disconnect_hangs: AtomicBool::new(false),
            journal,
        }
    }

    pub fn set_connect(&self, step: Step) {
        *self.connect.lock().unwrap() = step;
    }

    pub fn fail_disconnect(&self) {
        self.disconnect_fails.store(true, Ordering::SeqCst);
    }

    pub fn hang_disconnect(&self) {
        self.disconnect_hangs.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MqttSession for FakeMqtt {
    async fn connect(&self, _credentials: &Credentials) -> Result<(), ApiError> {
        self.journal.record("mqtt:connect");
        let step = self.connect.lock().unwrap().clone();
        step.run("").await
    }

    async fn disconnect(&self) -> Result<(), ApiError> {
        self.journal.record("mqtt:disconnect");
        if self.disconnect_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.disconnect_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Mqtt("broker gone".into()));
        }
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

/// All fakes for one account, sharing a journal.
pub struct Harness {
    pub journal: Journal,
    pub cloud: Arc<FakeCloud>,
    pub mqtt: Arc<FakeMqtt>,
    pub factory: Arc<FakeFactory>,
}

impl Harness {
    pub fn new() -> Self {
        let journal = Journal::default();
        Self {
            cloud: Arc::new(FakeCloud::new(journal.clone())),
            mqtt: Arc::new(FakeMqtt::new(journal.clone())),
            factory: Arc::new(FakeFactory::new(journal.clone())),
            journal,
        }
    }

    pub fn api(&self) -> Arc<dyn CloudApi> {
        Arc::clone(&self.cloud) as Arc<dyn CloudApi>
    }

    pub fn session(&self) -> Arc<dyn MqttSession> {
        Arc::clone(&self.mqtt) as Arc<dyn MqttSession>
    }

    pub fn devices(&self) -> Arc<dyn DeviceFactory> {
        Arc::clone(&self.factory) as Arc<dyn DeviceFactory>
    }
}
