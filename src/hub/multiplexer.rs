//! Reassembly of per-axis input records into complete sensor events
//!
//! The compass daemon writes one axis per record and closes each snapshot
//! with a synchronization record:
//!
//! ```text
//! REL ACCEL_X ─┐
//! REL ACCEL_Z ─┼─► pending[Accelerometer], pending_mask |= ACCELEROMETER
//! REL YAW     ─┘─► pending[Orientation],   pending_mask |= ORIENTATION
//! SYN         ───► flush pending ∩ enabled, stamped with the SYN time
//! ```

use super::calibration::{CalibrationTable, CODE_ACCEL_Z};
use super::one_shot::OneShot;
use super::state::SensorStateController;
use crate::device::{EventClass, InputEventSource, RawInputRecord};
use crate::sensor::{LogicalSensorId, SensorEvent, SensorMask, SensorPayload};
use tracing::{debug, error, trace, warn};

pub struct EventMultiplexer {
    table: CalibrationTable,
    pending: [SensorEvent; 4],
    pending_mask: SensorMask,
    motion_baseline: f32,
    motion_threshold: f32,
}

impl EventMultiplexer {
    pub fn new(table: CalibrationTable, motion_threshold: f32) -> Self {
        Self {
            table,
            pending: LogicalSensorId::ALL.map(SensorEvent::blank),
            pending_mask: SensorMask::empty(),
            motion_baseline: 0.0,
            motion_threshold,
        }
    }

    pub fn pending_mask(&self) -> SensorMask {
        self.pending_mask
    }

    pub fn pending_event(&self, sensor: LogicalSensorId) -> &SensorEvent {
        &self.pending[sensor.index()]
    }

    pub fn motion_baseline(&self) -> f32 {
        self.motion_baseline
    }

    /// Seeds the buffered readings of `sensors` from the device's current
    /// axis values. Nothing is marked pending.
    pub fn prime(&mut self, source: &dyn InputEventSource, sensors: SensorMask) {
        for sensor in sensors.sensors() {
            let slot = &mut self.pending[sensor.index()];
            for rule in self.table.rules_for(sensor) {
                if let Some(raw) = source.current_value(rule.code) {
                    rule.write(slot, raw);
                }
            }
            debug!("Primed {} from hardware: {:?}", sensor, slot.payload);
        }
    }

    /// Feeds one raw record through the reassembly state
    ///
    /// Returns the flushed batch on a synchronization record and `None`
    /// otherwise. A significant-motion event in the batch disarms that
    /// sensor through `controller` before returning.
    pub fn process_raw_event(
        &mut self,
        record: &RawInputRecord,
        controller: &mut SensorStateController,
    ) -> Option<Vec<SensorEvent>> {
        match record.class() {
            EventClass::AxisUpdate => {
                self.apply_axis(record.code, record.value);
                None
            }
            EventClass::Synchronization => Some(self.flush(record.time_ns, controller)),
            EventClass::Other(event_type) => {
                warn!(
                    "Skipping unknown input record (type={:#x}, code={:#x})",
                    event_type, record.code
                );
                None
            }
        }
    }

    fn apply_axis(&mut self, code: u16, raw: i32) {
        let Some(rule) = self.table.lookup(code) else {
            debug!("No calibration rule for axis code {:#x}", code);
            return;
        };

        let value = rule.write(&mut self.pending[rule.sensor.index()], raw);
        self.pending_mask.insert(rule.sensor.bit());
        trace!("{} {:?} <- {}", rule.sensor, rule.field, value);

        if code == CODE_ACCEL_Z {
            self.detect_motion(value);
        }
    }

    fn detect_motion(&mut self, z: f32) {
        let diff = self.motion_baseline - z;
        self.motion_baseline = z;
        if diff.abs() > self.motion_threshold {
            debug!("Significant motion, z changed by {}", diff);
            let slot = &mut self.pending[LogicalSensorId::SignificantMotion.index()];
            slot.payload = SensorPayload::Motion { data: [1.0] };
            self.pending_mask.insert(SensorMask::SIGNIFICANT_MOTION);
        }
    }

    fn flush(&mut self, time_ns: i64, controller: &mut SensorStateController) -> Vec<SensorEvent> {
        let mut batch = Vec::with_capacity(self.pending_mask.bits().count_ones() as usize);

        for sensor in self.pending_mask.sensors() {
            self.pending_mask.remove(sensor.bit());
            if !controller.is_enabled(sensor) {
                trace!("Dropping pending update of disabled {}", sensor);
                continue;
            }

            let slot = &mut self.pending[sensor.index()];
            slot.timestamp = time_ns;
            let event = *slot;
            batch.push(event);

            if sensor == LogicalSensorId::SignificantMotion {
                if let Err((_, e)) = OneShot::arm(sensor).fire(event).disarm(controller) {
                    error!("Could not disarm {} after it fired: {}", sensor, e);
                }
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Calibration;
    use crate::hub::calibration::*;
    use crate::hub::delay::DelayNegotiator;
    use crate::mock::{MockBackend, MockDelayControl, ScriptedSource};
    use crate::sensor::{PhysicalKind, SensorKind, Vector3};
    use proptest::prelude::*;
    use std::rc::Rc;

    fn unit_table() -> CalibrationTable {
        CalibrationTable::new(&Calibration {
            accel: [1.0; 3],
            magnetic: [1.0; 3],
            orientation: [1.0; 3],
        })
    }

    fn setup(
        enabled: &[LogicalSensorId],
    ) -> (Rc<MockBackend>, SensorStateController, EventMultiplexer) {
        let backend = Rc::new(MockBackend::default());
        let delays = DelayNegotiator::new(200_000_000, Box::new(MockDelayControl::default()));
        let mut controller = SensorStateController::new(backend.clone(), delays);
        for sensor in enabled {
            controller.set_sensor_enabled(*sensor, true).unwrap();
        }
        (backend, controller, EventMultiplexer::new(unit_table(), 1.0))
    }

    fn feed(
        mux: &mut EventMultiplexer,
        controller: &mut SensorStateController,
        records: &[RawInputRecord],
    ) -> Vec<Vec<SensorEvent>> {
        records
            .iter()
            .filter_map(|r| mux.process_raw_event(r, controller))
            .collect()
    }

    #[test]
    fn sync_flushes_enabled_accelerometer() {
        let (_backend, mut controller, _) = setup(&[LogicalSensorId::Accelerometer]);
        let mut mux = EventMultiplexer::new(CalibrationTable::default(), 1.0);

        let batches = feed(
            &mut mux,
            &mut controller,
            &[
                RawInputRecord::axis(CODE_ACCEL_X, 100, 10),
                RawInputRecord::axis(CODE_ACCEL_Y, 0, 11),
                RawInputRecord::axis(CODE_ACCEL_Z, 0, 12),
                RawInputRecord::sync(5_000),
            ],
        );

        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.len(), 1);
        let event = batch[0];
        assert_eq!(event.sensor, LogicalSensorId::Accelerometer);
        assert_eq!(event.kind, SensorKind::Accelerometer);
        assert_eq!(event.timestamp, 5_000);
        let factor = Calibration::default().accel[0];
        assert_eq!(
            event.payload,
            SensorPayload::Acceleration(Vector3 {
                x: 100.0 * factor,
                y: 0.0,
                z: 0.0,
                status: 3,
            })
        );
        assert!(mux.pending_mask().is_empty());
    }

    #[test]
    fn axis_records_never_return_a_batch() {
        let (_backend, mut controller, mut mux) = setup(&[LogicalSensorId::MagneticField]);
        assert!(mux
            .process_raw_event(&RawInputRecord::axis(CODE_MAGV_X, 3, 0), &mut controller)
            .is_none());
        assert_eq!(mux.pending_mask(), SensorMask::MAGNETIC_FIELD);
    }

    #[test]
    fn batch_follows_sensor_order_with_one_timestamp() {
        let (_backend, mut controller, mut mux) = setup(&[
            LogicalSensorId::Accelerometer,
            LogicalSensorId::MagneticField,
            LogicalSensorId::Orientation,
        ]);

        let batches = feed(
            &mut mux,
            &mut controller,
            &[
                RawInputRecord::axis(CODE_YAW, 90, 1),
                RawInputRecord::axis(CODE_MAGV_Y, 7, 2),
                RawInputRecord::axis(CODE_ACCEL_X, 1, 3),
                RawInputRecord::sync(99),
            ],
        );

        let order: Vec<_> = batches[0].iter().map(|e| e.sensor).collect();
        assert_eq!(
            order,
            vec![
                LogicalSensorId::Accelerometer,
                LogicalSensorId::MagneticField,
                LogicalSensorId::Orientation,
            ]
        );
        assert!(batches[0].iter().all(|e| e.timestamp == 99));
    }

    #[test]
    fn disabled_sensor_update_is_lost_at_sync() {
        let (_backend, mut controller, mut mux) = setup(&[LogicalSensorId::Accelerometer]);

        let batches = feed(
            &mut mux,
            &mut controller,
            &[
                RawInputRecord::axis(CODE_MAGV_X, 12, 1),
                RawInputRecord::sync(2),
            ],
        );
        assert_eq!(batches, vec![vec![]]);
        assert!(mux.pending_mask().is_empty());

        // Enabling later does not resurrect the dropped update
        controller
            .set_sensor_enabled(LogicalSensorId::MagneticField, true)
            .unwrap();
        let batch = mux
            .process_raw_event(&RawInputRecord::sync(3), &mut controller)
            .unwrap();
        assert!(batch.is_empty());

        // but the buffered field value lingers for the next flush
        let batch = feed(
            &mut mux,
            &mut controller,
            &[RawInputRecord::axis(CODE_MAGV_Y, 1, 4), RawInputRecord::sync(5)],
        );
        match batch[0][0].payload {
            SensorPayload::Magnetic(v) => assert_eq!((v.x, v.y), (12.0, 1.0)),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn unknown_records_are_skipped() {
        let (_backend, mut controller, mut mux) = setup(&[LogicalSensorId::Accelerometer]);
        let key = RawInputRecord {
            event_type: 0x01,
            code: 30,
            value: 1,
            time_ns: 0,
        };
        assert!(mux.process_raw_event(&key, &mut controller).is_none());
        assert!(mux
            .process_raw_event(&RawInputRecord::axis(0x2f, 1, 0), &mut controller)
            .is_none());
        assert!(mux.pending_mask().is_empty());
    }

    #[test]
    fn z_jump_fires_motion_even_when_nothing_is_enabled() {
        let (_backend, mut controller, mut mux) = setup(&[]);
        mux.process_raw_event(&RawInputRecord::axis(CODE_ACCEL_Z, 5, 0), &mut controller);
        assert_eq!(mux.motion_baseline(), 5.0);
        assert_eq!(
            mux.pending_mask(),
            SensorMask::ACCELEROMETER | SensorMask::SIGNIFICANT_MOTION
        );

        // Small change: baseline moves, no new motion
        let (_b, mut controller, mut quiet) = setup(&[]);
        quiet.process_raw_event(&RawInputRecord::axis(CODE_ACCEL_Z, 1, 0), &mut controller);
        assert_eq!(quiet.pending_mask(), SensorMask::ACCELEROMETER);
        assert_eq!(quiet.motion_baseline(), 1.0);
    }

    #[test]
    fn motion_fires_once_then_disarms() {
        let (backend, mut controller, mut mux) = setup(&[LogicalSensorId::SignificantMotion]);

        let batches = feed(
            &mut mux,
            &mut controller,
            &[
                RawInputRecord::axis(CODE_ACCEL_Z, 10, 1),
                RawInputRecord::sync(2),
                RawInputRecord::axis(CODE_ACCEL_Z, -10, 3),
                RawInputRecord::sync(4),
            ],
        );

        assert_eq!(batches[0].len(), 1);
        let event = batches[0][0];
        assert_eq!(event.sensor, LogicalSensorId::SignificantMotion);
        assert_eq!(event.kind, SensorKind::SignificantMotion);
        assert_eq!(event.payload, SensorPayload::Motion { data: [1.0] });
        assert_eq!(event.timestamp, 2);
        assert!(batches[1].is_empty());

        assert!(!controller.is_enabled(LogicalSensorId::SignificantMotion));
        assert_eq!(backend.disable_calls(PhysicalKind::Accelerometer), 1);
        assert_eq!(controller.accel_ref_count(), 0);
    }

    #[test]
    fn motion_disarm_keeps_independent_accelerometer() {
        let (backend, mut controller, mut mux) = setup(&[
            LogicalSensorId::Accelerometer,
            LogicalSensorId::SignificantMotion,
        ]);

        let batches = feed(
            &mut mux,
            &mut controller,
            &[RawInputRecord::axis(CODE_ACCEL_Z, 10, 1), RawInputRecord::sync(2)],
        );

        let sensors: Vec<_> = batches[0].iter().map(|e| e.sensor).collect();
        assert_eq!(
            sensors,
            vec![LogicalSensorId::Accelerometer, LogicalSensorId::SignificantMotion]
        );
        assert!(controller.is_enabled(LogicalSensorId::Accelerometer));
        assert!(!controller.is_enabled(LogicalSensorId::SignificantMotion));
        assert_eq!(backend.disable_calls(PhysicalKind::Accelerometer), 0);
        assert_eq!(controller.accel_ref_count(), 1);
    }

    #[test]
    fn failed_disarm_still_emits() {
        let (backend, mut controller, mut mux) = setup(&[LogicalSensorId::SignificantMotion]);
        backend.fail_with(libc::EIO);

        let batches = feed(
            &mut mux,
            &mut controller,
            &[RawInputRecord::axis(CODE_ACCEL_Z, 10, 1), RawInputRecord::sync(2)],
        );
        assert_eq!(batches[0].len(), 1);
        assert!(controller.is_enabled(LogicalSensorId::SignificantMotion));
    }

    #[test]
    fn prime_seeds_values_without_pending() {
        let source = ScriptedSource::default();
        source.set_value(CODE_ACCEL_X, 4);
        source.set_value(CODE_ROLL, 8);
        source.set_value(CODE_ORIENT_STATUS, 4);

        let mut mux = EventMultiplexer::new(unit_table(), 1.0);
        mux.prime(&source, SensorMask::ACCELEROMETER | SensorMask::ORIENTATION);

        assert!(mux.pending_mask().is_empty());
        match mux.pending_event(LogicalSensorId::Accelerometer).payload {
            SensorPayload::Acceleration(v) => assert_eq!(v.x, 4.0),
            other => panic!("unexpected payload {:?}", other),
        }
        match mux.pending_event(LogicalSensorId::Orientation).payload {
            SensorPayload::Orientation(o) => {
                assert_eq!(o.roll, -8.0);
                assert_eq!(o.status, 0);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    fn arb_record() -> impl Strategy<Value = RawInputRecord> {
        let codes = prop::sample::select(vec![
            CODE_ACCEL_X,
            CODE_ACCEL_Y,
            CODE_ACCEL_Z,
            CODE_MAGV_X,
            CODE_MAGV_Y,
            CODE_MAGV_Z,
            CODE_YAW,
            CODE_PITCH,
            CODE_ROLL,
            CODE_ORIENT_STATUS,
        ]);
        prop_oneof![
            4 => (codes, -2000i32..2000)
                .prop_map(|(code, value)| RawInputRecord::axis(code, value, 0)),
            1 => (0i64..1_000_000).prop_map(RawInputRecord::sync),
        ]
    }

    proptest! {
        #[test]
        fn batch_is_exactly_pending_and_enabled(
            records in prop::collection::vec(arb_record(), 0..64),
            enabled in 0u32..8,
        ) {
            // Significant motion is left out so the enabled set stays fixed
            let enabled = SensorMask::from_bits_truncate(enabled);
            let sensors: Vec<_> = enabled.sensors().collect();
            let (_backend, mut controller, mut mux) = setup(&sensors);

            for record in &records {
                let before = mux.pending_mask();
                match mux.process_raw_event(record, &mut controller) {
                    Some(batch) => {
                        let emitted = batch
                            .iter()
                            .fold(SensorMask::empty(), |m, e| m | e.sensor.bit());
                        prop_assert_eq!(emitted, before & enabled);
                        prop_assert!(batch.iter().all(|e| e.timestamp == record.time_ns));
                        prop_assert!(mux.pending_mask().is_empty());
                    }
                    None => prop_assert!(before.difference(mux.pending_mask()).is_empty()),
                }
            }
        }

        #[test]
        fn ref_count_stays_bounded(
            ops in prop::collection::vec((0usize..4, any::<bool>()), 0..32),
        ) {
            let (backend, mut controller, _mux) = setup(&[]);
            for (index, on) in ops {
                controller.set_sensor_enabled(LogicalSensorId::ALL[index], on).unwrap();
                let expected = [LogicalSensorId::Accelerometer, LogicalSensorId::SignificantMotion]
                    .iter()
                    .filter(|s| controller.is_enabled(**s))
                    .count() as u8;
                prop_assert!(controller.accel_ref_count() <= 2);
                prop_assert_eq!(controller.accel_ref_count(), expected);
            }
            let enables = backend.enable_calls(PhysicalKind::Accelerometer);
            let disables = backend.disable_calls(PhysicalKind::Accelerometer);
            prop_assert!(enables == disables || enables == disables + 1);
        }
    }
}
