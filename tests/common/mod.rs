#![allow(dead_code)]

use meteortraj::constants::KM_TO_M;
use meteortraj::geodetic::{eci_to_geo, eci_to_ra_dec, geo_to_eci, radec_to_altaz};
use meteortraj::measurement::MeasurementType;
use meteortraj::params::TrajectoryParams;
use meteortraj::solver::solution::VelocityModel;
use meteortraj::solver::{CameraOutput, PointOutput, SolverBackend, SolverOutput, TrajectoryInfo};
use meteortraj::stations::{Measurement, Station};
use meteortraj::time::offset_to_jd;
use meteortraj::traj_errors::TrajectoryError;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

pub const JDT_REF: f64 = 2457660.770667;
pub const SPEED: f64 = 20_000.0;

/// Ground site, degrees and meters.
pub struct Site {
    pub id: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub height: f64,
}

pub const ELGINFIELD: Site = Site {
    id: "Elginfield",
    lat: 43.19279,
    lon: -81.31565,
    height: 329.0,
};

pub const TAVISTOCK: Site = Site {
    id: "Tavistock",
    lat: 43.26420,
    lon: -80.77209,
    height: 324.0,
};

pub const DELHI: Site = Site {
    id: "Delhi",
    lat: 42.93,
    lon: -80.85,
    height: 250.0,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `n` frame times at `fps` frames per second, starting at zero.
pub fn frame_times(n: usize, fps: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 / fps).collect()
}

/// Straight meteor descending at 45° or so over southern Ontario.
pub struct Scenario {
    /// ECI position at t = 0 (meters).
    pub begin: Vector3<f64>,
    /// Unit ECI radiant, the meteor moves along `-radiant`.
    pub radiant: Vector3<f64>,
    pub speed: f64,
}

impl Scenario {
    pub fn new() -> Self {
        let (lat, lon) = (43.5_f64.to_radians(), (-81.0_f64).to_radians());
        let begin = geo_to_eci(lat, lon, 100_000.0, JDT_REF);
        let up = (geo_to_eci(lat, lon, 101_000.0, JDT_REF) - begin).normalize();
        let east = Vector3::z().cross(&up).normalize();

        Scenario {
            begin,
            radiant: (up + 0.8 * east).normalize(),
            speed: SPEED,
        }
    }

    pub fn position(&self, t: f64) -> Vector3<f64> {
        self.begin - self.radiant * self.speed * t
    }

    /// Azimuth and elevation of the meteor seen from `site` at true time `t`.
    pub fn observe(&self, site: &Site, t: f64) -> (f64, f64) {
        let (lat, lon) = (site.lat.to_radians(), site.lon.to_radians());
        let jd = offset_to_jd(JDT_REF, t);
        let station = geo_to_eci(lat, lon, site.height, jd);
        let (ra, dec) = eci_to_ra_dec(&(self.position(t) - station));
        radec_to_altaz(ra, dec, jd, lat, lon)
    }

    /// Station recording the meteor with a clock running `clock_bias` seconds ahead.
    pub fn station(&self, site: &Site, times: &[f64], clock_bias: f64) -> Station {
        let mut station = Station::new(
            site.id,
            site.lat.to_radians(),
            site.lon.to_radians(),
            site.height,
        )
        .unwrap();
        station
            .extend(times.iter().map(|&t| {
                let (azim, elev) = self.observe(site, t);
                Measurement::new(t + clock_bias, azim, elev)
            }))
            .unwrap();
        station
    }

    /// Station whose angles carry gaussian noise of `sigma` radians.
    pub fn noisy_station(
        &self,
        site: &Site,
        times: &[f64],
        rng: &mut StdRng,
        sigma: f64,
    ) -> Station {
        let normal = Normal::new(0.0, sigma).unwrap();
        let mut station = Station::new(
            site.id,
            site.lat.to_radians(),
            site.lon.to_radians(),
            site.height,
        )
        .unwrap();
        for &t in times {
            let (azim, elev) = self.observe(site, t);
            let measurement =
                Measurement::new(t, azim + normal.sample(rng), elev + normal.sample(rng))
                    .with_noise(sigma);
            station.push(measurement).unwrap();
        }
        station
    }
}

pub fn params(model: &str) -> TrajectoryParams {
    TrajectoryParams::builder()
        .jdt_ref(JDT_REF)
        .meas_type(MeasurementType::AzElE)
        .velocity_model(model.parse::<VelocityModel>().unwrap())
        .build()
        .unwrap()
}

/// Backend answering with the true trajectory and the given timing offsets.
pub struct TruthSolver {
    pub scenario: Scenario,
    pub tref_offsets: Vec<f64>,
    pub calls: usize,
}

impl TruthSolver {
    pub fn new(scenario: Scenario, tref_offsets: Vec<f64>) -> Self {
        TruthSolver {
            scenario,
            tref_offsets,
            calls: 0,
        }
    }

    fn point(&self, t: f64) -> PointOutput {
        let geo = eci_to_geo(&self.scenario.position(t), offset_to_jd(JDT_REF, t));
        PointOutput {
            lat: geo.lat,
            lon: geo.lon,
            hkm: geo.height / KM_TO_M,
            ..Default::default()
        }
    }

    fn camera(&self, info: &TrajectoryInfo, k: usize) -> CameraOutput {
        let input = &info.cameras[k];
        let offset = self.tref_offsets.get(k).copied().unwrap_or(0.0);
        let mut out = CameraOutput::default();

        for &dtime in &input.dtime {
            let t = dtime + offset;
            let jd = offset_to_jd(JDT_REF, t);
            let position = self.scenario.position(t);
            let geo = eci_to_geo(&position, jd);
            let station = geo_to_eci(input.lat, input.lon, input.hkm * KM_TO_M, jd);
            let range = (position - station).norm() / KM_TO_M;
            let (ra, dec) = eci_to_ra_dec(&(position - station));
            let (azim, elev) = radec_to_altaz(ra, dec, jd, input.lat, input.lon);

            out.meas_lat.push(geo.lat);
            out.meas_lon.push(geo.lon);
            out.meas_hkm.push(geo.height / KM_TO_M);
            out.meas_range.push(range);
            out.meas_vel.push(self.scenario.speed / KM_TO_M);
            out.model_lat.push(geo.lat);
            out.model_lon.push(geo.lon);
            out.model_hkm.push(geo.height / KM_TO_M);
            out.model_range.push(range);
            out.model_vel.push(self.scenario.speed / KM_TO_M);
            out.model_fit1.push(azim);
            out.model_fit2.push(elev);
            out.model_time.push(t);
        }
        out
    }
}

impl SolverBackend for TruthSolver {
    fn solve(&mut self, info: &TrajectoryInfo) -> Result<SolverOutput, TrajectoryError> {
        self.calls += 1;

        let begin = self.scenario.begin / KM_TO_M;
        let velocity = -self.scenario.radiant * self.scenario.speed / KM_TO_M;
        let tref_offsets: Vec<f64> = (0..info.numcameras())
            .map(|k| self.tref_offsets.get(k).copied().unwrap_or(0.0))
            .collect();

        let mut solution = vec![
            begin.x, begin.y, begin.z, velocity.x, velocity.y, velocity.z, 0.0, 0.0, 0.0,
        ];
        solution.extend(&tref_offsets);

        let (ra_radiant, dec_radiant) = eci_to_ra_dec(&self.scenario.radiant);

        Ok(SolverOutput {
            solution,
            ra_radiant,
            dec_radiant,
            ra_radiant_ip: ra_radiant,
            dec_radiant_ip: dec_radiant,
            vbegin: self.scenario.speed / KM_TO_M,
            max_convergence: 1.2,
            tref_offsets,
            rbeg: self.point(0.0),
            rend: self.point(1.0),
            cameras: (0..info.numcameras())
                .map(|k| self.camera(info, k))
                .collect(),
            ..Default::default()
        })
    }
}
