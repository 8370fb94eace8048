use nalgebra::Vector3;
use tracing::{debug, trace, warn};

use super::event::{ComponentRef, EventKind, FlightEvent};
use super::listener::ListenerSet;
use super::status::SimulationStatus;
use super::warning::Warning;
use crate::config::SimOptions;
use crate::error::{SimError, SimResult};
use crate::vehicle::EjectionDelay;

/// Minimum gap between a deployment trigger and the deployment itself, s.
const MIN_DEPLOY_DELAY: f64 = 0.001;

/// Speed above which a deployment is flagged, m/s.
const HIGH_DEPLOY_SPEED: f64 = 20.0;

/// Delay before aerodynamic warnings count after leaving the guide, s.
const WARNING_SETTLE_TIME: f64 = 0.25;

/// Pop the next due event. Before any motor has fired the clock jumps to
/// the next queued event.
pub(crate) fn next_event(status: &mut SimulationStatus, options: &SimOptions) -> SimResult<Option<FlightEvent>> {
    let next_time = match status.queue.peek() {
        Some(e) => e.time,
        None => return Ok(None),
    };
    if !status.motor_ignited && next_time > status.time {
        if next_time > options.max_time {
            return Err(SimError::NoMotorsIgnited);
        }
        status.time = next_time;
    }
    if next_time <= status.time {
        Ok(status.queue.pop())
    } else {
        Ok(None)
    }
}

/// Handle every due event. Returns true when the run should end.
///
/// Stage separations push the status of the dropped stages to `branches`.
pub(crate) fn handle_events(
    status: &mut SimulationStatus,
    options: &SimOptions,
    listeners: &mut ListenerSet,
    branches: &mut Vec<SimulationStatus>,
) -> SimResult<bool> {
    let mut end = false;
    while let Some(event) = next_event(status, options)? {
        if from_detached_stage(&event, status) {
            trace!(%event, "skipped, source stage detached");
            continue;
        }
        fire_triggers(&event, status);
        if listeners.on_event(&event, status) {
            end = true;
        }
        end |= handle_event(event, status, branches)?;
    }
    if !status.motor_ignited {
        return Err(SimError::NoMotorsIgnited);
    }
    Ok(end)
}

/// Whether `event` comes from a component no longer on this branch.
fn from_detached_stage(event: &FlightEvent, status: &SimulationStatus) -> bool {
    let config = &status.configuration;
    event
        .source
        .and_then(|source| config.rocket().stage_of(source))
        .is_some_and(|stage| !config.is_stage_active(stage))
}

/// Queue ignitions and deployments whose trigger matches `event`.
fn fire_triggers(event: &FlightEvent, status: &mut SimulationStatus) {
    let config = &status.configuration;
    let rocket = config.rocket();
    let mut follow_ups = Vec::new();

    for mount in config.active_mounts() {
        if !status.motors.is_ignited(mount.id) && mount.ignition.is_triggered_by(event, mount.stage, rocket) {
            follow_ups.push(
                FlightEvent::new(EventKind::Ignition, event.time + mount.ignition_delay)
                    .with_source(ComponentRef::Motor(mount.id)),
            );
        }
    }

    for device in config.active_recovery() {
        if !status.is_deployed(device.id) && device.trigger.is_triggered_by(event, device.stage, rocket) {
            follow_ups.push(
                FlightEvent::new(
                    EventKind::RecoveryDeviceDeployment,
                    event.time + device.deploy_delay.max(MIN_DEPLOY_DELAY),
                )
                .with_source(ComponentRef::Recovery(device.id)),
            );
        }
    }

    for e in follow_ups {
        status.add_event(e);
    }
}

/// Apply one event. Returns true for the terminal event.
fn handle_event(
    event: FlightEvent,
    status: &mut SimulationStatus,
    branches: &mut Vec<SimulationStatus>,
) -> SimResult<bool> {
    match event.kind {
        EventKind::Launch | EventKind::EjectionCharge | EventKind::GroundHit => {}

        EventKind::Ignition => {
            let Some(ComponentRef::Motor(id)) = event.source else {
                warn!(%event, "ignition without a motor source");
                return Ok(false);
            };
            let rocket = status.configuration.rocket();
            let Some(mount) = rocket.mount(id) else {
                return Ok(false);
            };
            let (stage, burn_time) = (mount.stage, mount.motor.burn_time());
            let stage_count = rocket.stage_count();
            if !status.configuration.is_stage_active(stage) || !status.motors.ignite(id, event.time) {
                return Ok(false);
            }
            status.motor_ignited = true;
            status.add_event(
                FlightEvent::new(EventKind::Burnout, event.time + burn_time).with_source(ComponentRef::Motor(id)),
            );
            if stage + 1 < stage_count && status.configuration.is_stage_active(stage + 1) {
                status.add_event(
                    FlightEvent::new(EventKind::StageSeparation, event.time)
                        .with_source(ComponentRef::Stage(stage)),
                );
            }
        }

        EventKind::Liftoff => status.liftoff = true,

        EventKind::LaunchRodCleared => {
            status.launch_rod_cleared = true;
            status.start_warning_time = status.time + WARNING_SETTLE_TIME;
        }

        EventKind::Burnout => {
            if !status.liftoff {
                return Err(SimError::BurnoutWithoutLiftoff { time: event.time });
            }
            if let Some(ComponentRef::Motor(id)) = event.source {
                status.motors.mark_burnout(id);
                let rocket = status.configuration.rocket();
                let charge = rocket
                    .mount(id)
                    .filter(|m| status.configuration.is_stage_active(m.stage))
                    .and_then(|m| match m.ejection_delay {
                        EjectionDelay::Seconds(d) => Some(d),
                        EjectionDelay::Plugged => None,
                    });
                if let Some(delay) = charge {
                    status.add_event(
                        FlightEvent::new(EventKind::EjectionCharge, event.time + delay)
                            .with_source(ComponentRef::Motor(id)),
                    );
                }
            }
        }

        EventKind::StageSeparation => {
            let Some(ComponentRef::Stage(stage)) = event.source else {
                warn!(%event, "separation without a stage source");
                return Ok(false);
            };
            branches.push(status.separated_branch(stage));
            status.configuration.set_to_stage(stage);
        }

        EventKind::RecoveryDeviceDeployment => {
            let Some(ComponentRef::Recovery(id)) = event.source else {
                warn!(%event, "deployment without a device source");
                return Ok(false);
            };
            let Some(stage) = status.configuration.rocket().recovery_device(id).map(|d| d.stage) else {
                return Ok(false);
            };
            if !status.configuration.is_stage_active(stage) || status.is_deployed(id) {
                return Ok(false);
            }
            check_deployment(status);
            status.deploy(id);
            status.liftoff = true;
        }

        EventKind::Apogee => status.apogee_reached = true,

        EventKind::SimulationEnd => {}

        EventKind::Altitude => return Ok(false),
    }

    let end = event.kind.is_terminal();
    debug!(%event, "handled");
    status.recorder.add_event(event);
    Ok(end)
}

/// Warn about deployments in conditions that may damage the device.
fn check_deployment(status: &mut SimulationStatus) {
    let burning = status
        .configuration
        .active_mounts()
        .any(|m| status.motors.is_burning(m.id));
    if burning {
        status.warnings.add(Warning::RecoveryDeploymentWhileBurning);
    }
    if !status.launch_rod_cleared {
        status.warnings.add(Warning::RecoveryLaunchGuide);
    }
    let speed = status.state.velocity.norm();
    if speed > HIGH_DEPLOY_SPEED {
        status.warnings.add(Warning::RecoveryHighSpeed(speed));
    }
}

/// Pin the rocket to the pad until it actually rises.
pub(crate) fn hold_on_pad(status: &mut SimulationStatus) {
    status.state.position = status.launch_origin;
    status.state.velocity = Vector3::zeros();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::data::DataTypeRegistry;
    use crate::sim::status::StepperKind;
    use crate::vehicle::{presets, IgnitionTrigger, MotorId, RecoveryId, Rocket};
    use std::sync::Arc;

    fn status_for(rocket: Rocket) -> SimulationStatus {
        SimulationStatus::new(Arc::new(rocket), &SimOptions::default(), Arc::new(DataTypeRegistry::new()))
    }

    fn drain(status: &mut SimulationStatus, branches: &mut Vec<SimulationStatus>) -> SimResult<bool> {
        handle_events(status, &SimOptions::default(), &mut ListenerSet::new(), branches)
    }

    fn kinds(status: &SimulationStatus) -> Vec<EventKind> {
        status.recorder.events().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn launch_ignites_and_schedules_burnout() {
        let mut s = status_for(presets::single_stage());
        s.add_event(FlightEvent::new(EventKind::Launch, 0.0));
        assert!(!drain(&mut s, &mut Vec::new()).unwrap());

        assert_eq!(kinds(&s), vec![EventKind::Launch, EventKind::Ignition]);
        assert!(s.motor_ignited);
        assert_eq!(s.motors.ignition_time(MotorId(0)), Some(0.0));
        let burnout = s.queue.peek().expect("burnout queued");
        assert_eq!(burnout.kind, EventKind::Burnout);
        assert!((burnout.time - 1.6).abs() < 1e-12);
    }

    #[test]
    fn burnout_before_liftoff_is_fatal() {
        let mut s = status_for(presets::single_stage());
        s.motor_ignited = true;
        s.add_event(FlightEvent::new(EventKind::Burnout, 0.0).with_source(ComponentRef::Motor(MotorId(0))));
        let err = drain(&mut s, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SimError::BurnoutWithoutLiftoff { .. }));
    }

    #[test]
    fn no_ignition_is_fatal() {
        let mut rocket = presets::single_stage();
        rocket.mounts[0].ignition = IgnitionTrigger::Never;
        let mut s = status_for(rocket);
        s.add_event(FlightEvent::new(EventKind::Launch, 0.0));
        assert!(matches!(drain(&mut s, &mut Vec::new()), Err(SimError::NoMotorsIgnited)));
    }

    #[test]
    fn delayed_ignition_fast_forwards_clock() {
        let mut rocket = presets::single_stage();
        rocket.mounts[0].ignition_delay = 2.0;
        let mut s = status_for(rocket);
        s.add_event(FlightEvent::new(EventKind::Launch, 0.0));
        drain(&mut s, &mut Vec::new()).unwrap();
        assert_eq!(s.time, 2.0);
        assert_eq!(s.motors.ignition_time(MotorId(0)), Some(2.0));
    }

    #[test]
    fn burnout_fires_ejection_charge_and_deploys() {
        let mut rocket = presets::single_stage();
        rocket.recovery[0].trigger = crate::vehicle::DeployTrigger::Ejection;
        let mut s = status_for(rocket);
        s.motor_ignited = true;
        s.liftoff = true;
        s.launch_rod_cleared = true;
        s.motors.ignite(MotorId(0), 0.0);
        s.time = 10.0;
        s.add_event(FlightEvent::new(EventKind::Burnout, 1.6).with_source(ComponentRef::Motor(MotorId(0))));
        drain(&mut s, &mut Vec::new()).unwrap();

        // charge at 6.6, deployment 1 ms later
        assert_eq!(
            kinds(&s),
            vec![EventKind::Burnout, EventKind::EjectionCharge, EventKind::RecoveryDeviceDeployment]
        );
        assert!(s.is_deployed(RecoveryId(0)));
        assert_eq!(s.stepper_kind(), StepperKind::Recovery);
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn deployment_on_guide_while_burning_warns() {
        let mut s = status_for(presets::single_stage());
        s.motor_ignited = true;
        s.motors.ignite(MotorId(0), 0.0);
        s.state.velocity.z = 25.0;
        s.add_event(
            FlightEvent::new(EventKind::RecoveryDeviceDeployment, 0.0)
                .with_source(ComponentRef::Recovery(RecoveryId(0))),
        );
        drain(&mut s, &mut Vec::new()).unwrap();
        assert!(s.liftoff);
        assert_eq!(s.warnings.len(), 3);
        assert!(s.warnings.contains(|w| matches!(w, Warning::RecoveryHighSpeed(v) if *v == 25.0)));
    }

    #[test]
    fn staging_separates_and_branches() {
        let mut s = status_for(presets::two_stage());
        s.add_event(FlightEvent::new(EventKind::Launch, 0.0));
        drain(&mut s, &mut Vec::new()).unwrap();
        assert_eq!(s.motors.ignition_time(MotorId(1)), Some(0.0));
        assert!(!s.motors.is_ignited(MotorId(0)));

        s.liftoff = true;
        s.time = 1.7;
        let mut branches = Vec::new();
        drain(&mut s, &mut branches).unwrap();

        assert_eq!(
            kinds(&s),
            vec![
                EventKind::Launch,
                EventKind::Ignition,
                EventKind::Burnout,
                EventKind::EjectionCharge,
                EventKind::Ignition,
                EventKind::StageSeparation,
            ]
        );
        assert_eq!(s.motors.ignition_time(MotorId(0)), Some(1.6));
        assert!(!s.configuration.is_stage_active(1));
        assert_eq!(branches.len(), 1);
        assert!(branches[0].configuration.is_stage_active(1));
    }

    #[test]
    fn pending_booster_events_follow_the_dropped_stage() {
        let mut rocket = presets::two_stage();
        rocket.mounts[1].ejection_delay = EjectionDelay::Seconds(3.0);
        let mut s = status_for(rocket);
        s.add_event(FlightEvent::new(EventKind::Launch, 0.0));
        drain(&mut s, &mut Vec::new()).unwrap();

        s.liftoff = true;
        s.time = 1.7;
        let mut branches = Vec::new();
        drain(&mut s, &mut branches).unwrap();
        let mut booster = branches.pop().expect("booster branch");

        // booster charge at 4.6 is due on both branches
        s.time = 5.0;
        booster.time = 5.0;
        drain(&mut s, &mut Vec::new()).unwrap();
        drain(&mut booster, &mut Vec::new()).unwrap();

        assert!(!kinds(&s).contains(&EventKind::EjectionCharge));
        assert_eq!(kinds(&booster), vec![EventKind::EjectionCharge]);
        let charge = &booster.recorder.events()[0];
        assert!((charge.time - 4.6).abs() < 1e-9);
        assert_eq!(charge.source, Some(ComponentRef::Motor(MotorId(1))));
        // sustainer burnout stays on the sustainer branch
        assert!(kinds(&s).contains(&EventKind::Burnout));
    }
}
