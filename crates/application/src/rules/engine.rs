use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use domain::{
    ActionRequest, ChangeEvent, CommandDispatcher, PropertyValue, RuleSettings, ThermostatMode,
    ThingDescriptor, ThingId, ThingKind,
};

use crate::registry::ThingRegistry;

/// Mode-derived simulation targets and step sizes of the environmental tick.
const ECO_TARGET_C: f64 = 17.0;
const COMFORT_TARGET_C: f64 = 19.0;
const PASSIVE_FLOOR_C: f64 = 15.0;
const HEAT_STEP_C: f64 = 0.1;
const COOL_STEP_C: f64 = 0.05;
const TEMP_DEADBAND_C: f64 = 0.1;

/// Stimulus classes of the engine. Everything is funneled through one
/// channel into one task, so ticks serialize with the reactive path.
#[derive(Debug)]
pub enum RuleInput {
    Change(ChangeEvent),
    EnvTick,
    InactivityTick,
}

/// Thermostat update produced by the environmental tick. The gateway loops
/// it back through the change propagator so the simulated change takes the
/// same path as a real peer notification.
#[derive(Debug, Clone)]
pub struct SimulatedUpdate {
    pub thing_id: ThingId,
    pub kind: ThingKind,
    pub properties: Vec<(String, PropertyValue)>,
}

/// Condensed view of device state, distilled from the property sets of
/// exactly one peer per kind. Updated only via the propagation path and the
/// environmental tick; the only state rules may read.
#[derive(Debug, Clone)]
pub struct CondensedAutomationState {
    pub motion_active: bool,
    pub last_motion_at: Option<Instant>,
    pub lamp_on: bool,
    pub current_temp: f64,
    pub target_temp: f64,
    pub mode: ThermostatMode,
    pub heating: bool,
    pub last_manual_override_at: Option<Instant>,
}

impl Default for CondensedAutomationState {
    fn default() -> Self {
        Self {
            motion_active: false,
            last_motion_at: None,
            lamp_on: false,
            current_temp: 20.0,
            target_temp: 19.0,
            mode: ThermostatMode::Comfort,
            heating: false,
            last_manual_override_at: None,
        }
    }
}

/// Reactive automation state machine. One instance runs on one task; all
/// state transitions happen inline, only the outbound dispatches and the
/// one-shot lamp auto-off race with the core.
pub struct RuleEngine {
    state: CondensedAutomationState,
    settings: RuleSettings,
    registry: Arc<ThingRegistry>,
    dispatcher: Arc<dyn CommandDispatcher>,
    feedback_tx: mpsc::Sender<SimulatedUpdate>,
    /// Pending lamp auto-off. A new motion event resets it instead of
    /// stacking a second timer.
    auto_off: Option<JoinHandle<()>>,
}

impl RuleEngine {
    pub fn new(
        settings: RuleSettings,
        registry: Arc<ThingRegistry>,
        dispatcher: Arc<dyn CommandDispatcher>,
        feedback_tx: mpsc::Sender<SimulatedUpdate>,
    ) -> Self {
        Self {
            state: CondensedAutomationState::default(),
            settings,
            registry,
            dispatcher,
            feedback_tx,
            auto_off: None,
        }
    }

    pub fn state(&self) -> &CondensedAutomationState {
        &self.state
    }

    /// Consumes inputs until the channel closes.
    pub async fn run(mut self, mut rx: mpsc::Receiver<RuleInput>) {
        info!("Rule engine started");
        while let Some(input) = rx.recv().await {
            self.handle(input).await;
        }
        info!("Rule engine stopped");
    }

    pub async fn handle(&mut self, input: RuleInput) {
        match input {
            RuleInput::Change(event) => self.on_change(event).await,
            RuleInput::EnvTick => self.on_env_tick().await,
            RuleInput::InactivityTick => self.on_inactivity_tick().await,
        }
    }

    async fn on_change(&mut self, event: ChangeEvent) {
        self.ingest(&event);

        if self.cooldown_active() {
            debug!(key = %event.key, "Manual-override cooldown active, rules suppressed");
            return;
        }

        self.rule_motion_to_lamp(&event).await;
        self.rule_cold_presence_comfort(&event).await;
    }

    /// Applies a change event to the condensed state. Events whose kind and
    /// key map to no field are ignored, not an error.
    fn ingest(&mut self, event: &ChangeEvent) {
        match (event.kind, event.key.as_str()) {
            (ThingKind::MotionSensor, "motion") => {
                if let Some(active) = event.value.as_bool() {
                    self.state.motion_active = active;
                    if active {
                        self.state.last_motion_at = Some(Instant::now());
                    }
                }
            }
            // lastDetected is informational; the condensed state keeps its
            // own monotonic timestamp.
            (ThingKind::MotionSensor, "lastDetected") => {}
            (ThingKind::Lamp, "on") => {
                if let Some(on) = event.value.as_bool() {
                    self.state.lamp_on = on;
                }
            }
            (ThingKind::Thermostat, "currentTemperature") => {
                if let Some(t) = event.value.as_f64() {
                    self.state.current_temp = t;
                }
            }
            (ThingKind::Thermostat, "targetTemperature") => {
                if let Some(t) = event.value.as_f64() {
                    self.state.target_temp = t;
                }
            }
            (ThingKind::Thermostat, "heating") => {
                if let Some(h) = event.value.as_bool() {
                    self.state.heating = h;
                }
            }
            (ThingKind::Thermostat, "mode") => {
                if let Some(mode) = event.value.as_str().and_then(|s| s.parse().ok()) {
                    self.state.mode = mode;
                    if mode == ThermostatMode::Manual {
                        self.state.last_manual_override_at = Some(Instant::now());
                        info!("Manual override, automation cooldown started");
                    }
                }
            }
            _ => {
                debug!(kind = %event.kind, key = %event.key, "Change maps to no condensed field, ignored");
            }
        }
    }

    fn cooldown_active(&self) -> bool {
        self.state
            .last_manual_override_at
            .is_some_and(|at| at.elapsed() < self.settings.manual_cooldown())
    }

    /// Motion became true, lamp off: turn the lamp on and schedule a
    /// one-shot auto-off.
    async fn rule_motion_to_lamp(&mut self, event: &ChangeEvent) {
        let motion_on = event.kind == ThingKind::MotionSensor
            && event.key == "motion"
            && event.value.as_bool() == Some(true);
        if !motion_on || self.state.lamp_on {
            return;
        }

        let Some(lamp) = self.registry.find_first_by_kind(ThingKind::Lamp) else {
            return;
        };

        info!(lamp_id = %lamp.id, "Rule: motion -> lamp on");
        self.trigger(&lamp, ActionRequest::plain("turnOn")).await;
        self.schedule_auto_off(lamp);
    }

    /// Temperature reading below the cold threshold while motion is active:
    /// switch the thermostat to comfort unless it already is.
    async fn rule_cold_presence_comfort(&mut self, event: &ChangeEvent) {
        let cold_reading = event.kind == ThingKind::Thermostat
            && event.key == "currentTemperature"
            && event
                .value
                .as_f64()
                .is_some_and(|t| t < self.settings.cold_threshold_c);
        if !cold_reading || !self.state.motion_active || self.state.mode == ThermostatMode::Comfort
        {
            return;
        }

        let Some(thermostat) = self.registry.find_first_by_kind(ThingKind::Thermostat) else {
            return;
        };

        info!(thermostat_id = %thermostat.id, "Rule: cold + presence -> comfort mode");
        self.trigger(&thermostat, ActionRequest::set_mode(ThermostatMode::Comfort))
            .await;
    }

    /// Advances the simulated temperature toward the mode-derived target and
    /// recomputes the heating flag. Emits a feedback update only when
    /// something actually changed, so converged state produces no
    /// notification storm.
    async fn on_env_tick(&mut self) {
        let Some(thermostat) = self.registry.find_first_by_kind(ThingKind::Thermostat) else {
            return;
        };

        let current = self.state.current_temp;
        let mut new_temp = current;
        let mut new_heating = self.state.heating;

        match self.state.mode {
            ThermostatMode::Off => {
                new_heating = false;
                if current > PASSIVE_FLOOR_C {
                    new_temp -= COOL_STEP_C;
                }
            }
            mode => {
                let goal = match mode {
                    ThermostatMode::Eco => ECO_TARGET_C,
                    ThermostatMode::Comfort => COMFORT_TARGET_C,
                    ThermostatMode::Manual => self.state.target_temp,
                    ThermostatMode::Off => unreachable!(),
                };
                let diff = goal - current;
                if diff.abs() > TEMP_DEADBAND_C {
                    new_heating = diff > 0.0;
                    new_temp += if diff > 0.0 { HEAT_STEP_C } else { -COOL_STEP_C };
                } else {
                    new_heating = false;
                }
            }
        }

        new_temp = (new_temp * 100.0).round() / 100.0;
        if new_temp == current && new_heating == self.state.heating {
            return;
        }

        self.state.current_temp = new_temp;
        self.state.heating = new_heating;
        debug!(temp = new_temp, heating = new_heating, "Environmental tick");

        let update = SimulatedUpdate {
            thing_id: thermostat.id,
            kind: ThingKind::Thermostat,
            properties: vec![
                ("currentTemperature".into(), PropertyValue::Number(new_temp)),
                ("heating".into(), PropertyValue::Bool(new_heating)),
            ],
        };
        if let Err(e) = self.feedback_tx.send(update).await {
            warn!(error = %e, "Feedback channel closed, simulated update dropped");
        }
    }

    /// Inactivity rule plus the cold+presence backstop. Both are idempotent:
    /// safe to repeat every tick while their condition holds.
    async fn on_inactivity_tick(&mut self) {
        if self.cooldown_active() {
            return;
        }

        let lamp = self.registry.find_first_by_kind(ThingKind::Lamp);
        let thermostat = self.registry.find_first_by_kind(ThingKind::Thermostat);
        let (Some(lamp), Some(thermostat)) = (lamp, thermostat) else {
            return;
        };

        let idle = self
            .state
            .last_motion_at
            .is_some_and(|at| at.elapsed() > self.settings.inactivity_threshold());
        if idle {
            info!("Rule: no motion -> lamp off + eco mode");
            self.trigger(&lamp, ActionRequest::plain("turnOff")).await;
            self.trigger(&thermostat, ActionRequest::set_mode(ThermostatMode::Eco))
                .await;
        }

        // Backstop for a missed reactive cold+presence event. Same rule,
        // same single action.
        if self.state.current_temp < self.settings.cold_threshold_c
            && self.state.motion_active
            && self.state.mode != ThermostatMode::Comfort
        {
            info!("Rule backstop: cold + presence -> comfort mode");
            self.trigger(&thermostat, ActionRequest::set_mode(ThermostatMode::Comfort))
                .await;
        }
    }

    /// Fire-and-forget dispatch. Failures are logged by the dispatcher; the
    /// condensed state reflects intended state and is never rolled back.
    async fn trigger(&self, target: &ThingDescriptor, request: ActionRequest) {
        self.dispatcher.dispatch(target, &request).await;
    }

    fn schedule_auto_off(&mut self, lamp: ThingDescriptor) {
        if let Some(pending) = self.auto_off.take() {
            pending.abort();
        }

        let dispatcher = self.dispatcher.clone();
        // Capture the deadline now, not when the task is first polled, so
        // the delay is measured from the motion event itself.
        let sleep = tokio::time::sleep(self.settings.motion_auto_off());
        self.auto_off = Some(tokio::spawn(async move {
            sleep.await;
            debug!(lamp_id = %lamp.id, "Auto-off timer elapsed");
            dispatcher
                .dispatch(&lamp, &ActionRequest::plain("turnOff"))
                .await;
        }));
    }
}

/// Spawns the two periodic stimulus timers. They only send inputs; the
/// engine task does the work, which keeps ticks serialized with the
/// reactive path.
pub fn start_ticks(
    tx: mpsc::Sender<RuleInput>,
    settings: &RuleSettings,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let env = {
        let tx = tx.clone();
        let every = settings.env_tick();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await; // the first tick completes immediately
            loop {
                interval.tick().await;
                if tx.send(RuleInput::EnvTick).await.is_err() {
                    break;
                }
            }
        })
    };

    let inactivity = {
        let every = settings.inactivity_tick();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(RuleInput::InactivityTick).await.is_err() {
                    break;
                }
            }
        })
    };

    (env, inactivity)
}
