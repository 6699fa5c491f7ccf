//! 解析流程的端到端测试：合成的 .castep / .geom / .bands / .castep_bin 输入

use castep_parser::models::{BandsSource, RowSeries, ScalarSeries, TensorSeries};
use castep_parser::parsers::fortran::FortranWriter;
use castep_parser::{CastepError, ExitStatus, ParserConfig, RawParser, UnitTable};
use std::io::Cursor;

const FINAL_ENERGY: f64 = -31.69658404;
const STEPS: usize = 5;

const HEADER: &str = r#" +-------------------------------------------------+
 |      Welcome to Academic Release CASTEP version 19.11   |
 +-------------------------------------------------+
 output verbosity                               : normal  (1)
 output length unit                             : A
 output energy unit                             : eV
 output force unit                              : eV/A
 output pressure unit                           : GPa
 output frequency unit                          : cm-1
 Files used for pseudopotentials:
    Si Si_00PBE.usp

 Total number of ions in cell =    2
 Point group of crystal =    32: Oh, m-3m, 4/m -3 2/m
 Space group of crystal =   227: Fd-3m, F 4d 2 3 -1d
 Number of kpoints used =            10
 Calculation parallelised over    4 processes.
 +---------------- MEMORY AND SCRATCH DISK ESTIMATES -----------------+
"#;

const TAIL: &str = r#" Initialisation time =      1.05 s
 Calculation time    =     10.33 s
 Finalisation time   =      0.02 s
 Total time          =     11.40 s
 Peak Memory Use     = 123456 kB
 Overall parallel efficiency rating: Satisfactory (64%)
"#;

fn iteration(i: usize) -> String {
    let e = FINAL_ENERGY + 0.001 * (STEPS - 1 - i) as f64;
    format!(
        r#" Final energy, E             =  {e:.8}     eV
 Final free energy (E-TS)    =  {e:.8}     eV
 NB est. 0K energy (E-0.5TS)      =  {e:.8}     eV

 ******************************** Forces ********************************
 *                                                                      *
 *                     Cartesian components (eV/A)                      *
 * -------------------------------------------------------------------- *
 *                         x                    y                    z  *
 *                                                                      *
 * Si              1      0.00100              0.00000              0.00000   *
 * Si              2     -0.00100              0.00000              0.00000   *
 *                                                                      *
 ************************************************************************

 ***************** Stress Tensor *****************
 *                                               *
 *          Cartesian components (GPa)           *
 * --------------------------------------------- *
 *             x             y             z     *
 *                                               *
 *  x     -1.000000      0.000000      0.000000  *
 *  y      0.000000     -1.000000      0.000000  *
 *  z      0.000000      0.000000     -1.000000  *
 *                                               *
 *  Pressure:    1.0000                          *
 *                                               *
 *************************************************

 *********** Symmetrised Stress Tensor ***********
 *                                               *
 *  x     -0.500000      0.000000      0.000000  *
 *  y      0.000000     -0.500000      0.000000  *
 *  z      0.000000      0.000000     -0.500000  *
 *                                               *
 *  Pressure:    0.5000                          *
 *                                               *
 *************************************************

 LBFGS: finished iteration     {i} with enthalpy= {e:.8E} eV
"#,
        e = e,
        i = i + 1
    )
}

fn castep_log(finished: bool, extra_body: &str) -> Vec<String> {
    let mut text = String::from(HEADER);
    for i in 0..STEPS {
        text.push_str(&iteration(i));
    }
    text.push_str(extra_body);
    if finished {
        text.push_str(TAIL);
    }
    text.lines().map(String::from).collect()
}

fn geom_file() -> Vec<String> {
    let mut text = String::from(" BEGIN header\n  \n END header\n  \n");
    for i in 0..STEPS {
        let e = (FINAL_ENERGY + 0.001 * (STEPS - 1 - i) as f64) / UnitTable::default().eh;
        text.push_str(&format!(
            r#"                                      {i}                                                     T   T   T   T
                   {e:.16E}   {e:.16E}                             <-- E
                    1.0260000000000000E+001    0.0000000000000000E+000    0.0000000000000000E+000  <-- h
                    0.0000000000000000E+000    1.0260000000000000E+001    0.0000000000000000E+000  <-- h
                    0.0000000000000000E+000    0.0000000000000000E+000    1.0260000000000000E+001  <-- h
 Si              1    0.0000000000000000E+000    0.0000000000000000E+000    0.0000000000000000E+000  <-- R
 Si              2    2.5650000000000000E+000    2.5650000000000000E+000    2.5650000000000000E+000  <-- R
 Si              1    1.9446904000000000E-005    0.0000000000000000E+000    0.0000000000000000E+000  <-- F
 Si              2   -1.9446904000000000E-005    0.0000000000000000E+000    0.0000000000000000E+000  <-- F

"#,
            i = i,
            e = e
        ));
    }
    text.lines().map(String::from).collect()
}

fn bands_file() -> Vec<String> {
    r#"Number of k-points   2
Number of spin components 1
Number of electrons    8.000
Number of eigenvalues      2
Fermi energy (in atomic units)     0.200000
Unit cell vectors
   10.260000    0.000000    0.000000
    0.000000   10.260000    0.000000
    0.000000    0.000000   10.260000
K-point    1  0.00000000  0.00000000  0.00000000  0.50000000
Spin component    1
   -0.10000000
    0.30000000
K-point    2  0.50000000  0.00000000  0.00000000  0.50000000
Spin component    1
   -0.05000000
    0.35000000
"#
    .lines()
    .map(String::from)
    .collect()
}

fn checkpoint_bytes() -> Vec<u8> {
    let mut w = FortranWriter::new(Vec::new());
    w.write_tag("CELL%REAL_LATTICE").unwrap();
    w.write_f64s(&[10.26, 0.0, 0.0, 0.0, 10.26, 0.0, 0.0, 0.0, 10.26]).unwrap();
    w.write_tag("CELL%NUM_SPECIES").unwrap();
    w.write_i32s(&[1]).unwrap();
    w.write_tag("CELL%MAX_IONS_IN_SPECIES").unwrap();
    w.write_i32s(&[2]).unwrap();
    w.write_tag("CELL%NUM_IONS_IN_SPECIES").unwrap();
    w.write_i32s(&[2]).unwrap();
    w.write_tag("CELL%SPECIES_SYMBOL").unwrap();
    w.write_record(b"Si      ").unwrap();
    w.write_tag("NKPTS").unwrap();
    w.write_i32s(&[2]).unwrap();
    w.write_tag("KPOINTS").unwrap();
    w.write_f64s(&[0.0, 0.0, 0.0, 0.5, 0.0, 0.0]).unwrap();
    w.write_tag("KPOINT_WEIGHTS").unwrap();
    w.write_f64s(&[0.25, 0.75]).unwrap();
    w.write_tag("FERMI_ENERGY").unwrap();
    w.write_f64s(&[0.2]).unwrap();
    w.write_tag("EIGENVALUES").unwrap();
    w.write_i32s(&[2, 1, 2]).unwrap();
    // 能带块中的 k 点顺序与当前列表相反
    for coords in [[0.5, 0.0, 0.0], [0.0, 0.0, 0.0]] {
        w.write_f64s(&coords).unwrap();
        w.write_f64s(&[2.0, 0.0]).unwrap();
        w.write_f64s(&[-0.1, 0.3]).unwrap();
    }
    w.write_tag("END").unwrap();
    w.into_inner()
}

fn parser() -> RawParser<'static> {
    RawParser::new(ParserConfig::default())
}

#[test]
fn test_finished_geometry_optimisation() {
    let run = parser()
        .with_trajectory("Si.geom", &geom_file())
        .parse(&castep_log(true, ""))
        .unwrap();

    assert_eq!(run.exit_status, ExitStatus::CalcFinished);
    assert!((run.record.get_f64("total_energy").unwrap() - FINAL_ENERGY).abs() < 1e-8);
    assert_eq!(run.record.get_i64("num_ions"), Some(2));
    assert_eq!(run.record.get_str("castep_version"), Some("19.11"));
    assert_eq!(run.record.get_i64("parallel_procs"), Some(4));
    assert_eq!(run.record.get_f64("total_time"), Some(11.40));
    assert!(run.record.warnings().is_empty());

    let traj = &run.trajectory;
    assert_eq!(traj.num_steps(), STEPS);
    let positions = traj.rows(RowSeries::Positions).unwrap();
    let forces = traj.rows(RowSeries::Forces).unwrap();
    assert_eq!(positions.len(), STEPS);
    assert_eq!(forces.len(), STEPS);
    assert!(positions.iter().all(|p| p.len() == 2));
    assert!(forces.iter().all(|f| f.len() == 2));
    assert_eq!(traj.symbols, vec!["Si", "Si"]);

    // .geom 中的能量换算后应与日志一致
    let geom_energy = traj.scalar(ScalarSeries::GeomEnergy).unwrap();
    assert!((geom_energy[STEPS - 1] - FINAL_ENERGY).abs() < 1e-6);
    assert_eq!(traj.scalar(ScalarSeries::TotalEnergy).unwrap().len(), STEPS);
}

#[test]
fn test_truncated_run() {
    let run = parser().parse(&castep_log(false, "")).unwrap();
    assert_eq!(run.exit_status, ExitStatus::ErrorNoEndOfCalculation);
    assert_eq!(run.exit_status.code(), 101);
}

#[test]
fn test_error_artifact() {
    let run = parser()
        .with_error_files(true, "Error Message\nError")
        .parse(&castep_log(true, ""))
        .unwrap();
    assert_eq!(run.exit_status, ExitStatus::ErrorCastepError);
    assert_eq!(run.record.get_str("error_messages"), Some("Error Message\nError"));
}

#[test]
fn test_scf_failure_beats_error_artifact() {
    let extra = " SCF cycles performed but system has not reached the groundstate.\n";
    let run = parser()
        .with_error_files(true, "Error")
        .parse(&castep_log(true, extra))
        .unwrap();
    assert_eq!(run.exit_status, ExitStatus::ErrorScfNotConverged);
}

#[test]
fn test_stress_and_forces_blocks() {
    let run = parser().parse(&castep_log(true, "")).unwrap();
    let traj = &run.trajectory;

    assert_eq!(traj.tensor(TensorSeries::Stress).unwrap().len(), STEPS);
    assert_eq!(traj.tensor(TensorSeries::SymmStress).unwrap().len(), STEPS);
    assert_eq!(traj.scalar(ScalarSeries::Pressure).unwrap().len(), STEPS);
    assert_eq!(traj.scalar(ScalarSeries::SymmPressure).unwrap().len(), STEPS);
    assert_eq!(traj.tensor(TensorSeries::Stress).unwrap()[0][1][1], -1.0);
    assert_eq!(traj.scalar(ScalarSeries::SymmPressure).unwrap()[4], 0.5);

    let forces = traj.rows(RowSeries::Forces).unwrap();
    assert_eq!(forces.len(), STEPS);
    assert_eq!(forces[0][1], [-0.001, 0.0, 0.0]);
    assert_eq!(traj.scalar(ScalarSeries::Enthalpy).unwrap().len(), STEPS);
}

#[test]
fn test_unit_pruning_invariant() {
    let run = parser()
        .with_trajectory("Si.geom", &geom_file())
        .parse(&castep_log(true, ""))
        .unwrap();

    let traj_keys = run.trajectory.keys();
    let data_keys: Vec<&str> = run
        .record
        .keys()
        .filter(|k| !k.starts_with("unit_"))
        .collect();

    for key in run.record.keys().filter(|k| k.starts_with("unit_")) {
        let quantity = &key["unit_".len()..];
        assert!(
            data_keys.iter().chain(traj_keys.iter()).any(|k| k.contains(quantity)),
            "unit field '{}' has no referent",
            key
        );
    }
    assert!(run.record.contains_key("unit_energy"));
    assert!(!run.record.contains_key("unit_length"));
    assert!(!run.record.contains_key("unit_frequency"));
}

#[test]
fn test_parsing_is_idempotent() {
    let log = castep_log(true, "");
    let geom = geom_file();
    let first = parser().with_trajectory("Si.geom", &geom).parse(&log).unwrap();
    let second = parser().with_trajectory("Si.geom", &geom).parse(&log).unwrap();

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[test]
fn test_bands_from_bands_file() {
    let units = UnitTable::default();
    let run = parser()
        .with_bands(&bands_file())
        .with_checkpoint(Cursor::new(checkpoint_bytes()), false)
        .parse(&castep_log(true, ""))
        .unwrap();

    let bands = run.bands.unwrap();
    assert_eq!(bands.source, BandsSource::BandsFile);
    assert_eq!(bands.nkpts(), 2);
    assert!((bands.eigenvalues[0][1][1] - 0.35 * units.eh).abs() < 1e-9);
}

#[test]
fn test_bands_from_checkpoint() {
    let units = UnitTable::default();
    let run = parser()
        .with_bands(&bands_file())
        .with_checkpoint(Cursor::new(checkpoint_bytes()), true)
        .parse(&castep_log(true, ""))
        .unwrap();

    let bands = run.bands.unwrap();
    assert_eq!(bands.source, BandsSource::Checkpoint);
    assert_eq!(bands.kpoints.coords()[0], [0.5, 0.0, 0.0]);
    assert_eq!(bands.kpoints.weights(), vec![0.75, 0.25]);
    assert!((bands.fermi_energies[0] - 0.2 * units.eh).abs() < 1e-9);
    assert!((bands.cell[2][2] - 10.26 * units.a0).abs() < 1e-9);
    assert_eq!(run.trajectory.symbols, vec!["Si", "Si"]);
}

#[test]
fn test_inconsistent_bands_is_error() {
    let mut bands = bands_file();
    bands.pop();
    let err = parser()
        .with_bands(&bands)
        .parse(&castep_log(true, ""))
        .unwrap_err();
    assert!(matches!(err, CastepError::BandsMismatch(_)));
}

#[test]
fn test_codata_revision_changes_conversion() {
    let config = ParserConfig {
        codata: "2002".parse().unwrap(),
        ..ParserConfig::default()
    };
    let run_2002 = RawParser::new(config)
        .with_trajectory("Si.geom", &geom_file())
        .parse(&castep_log(true, ""))
        .unwrap();
    let run_2010 = parser()
        .with_trajectory("Si.geom", &geom_file())
        .parse(&castep_log(true, ""))
        .unwrap();

    let a = run_2002.trajectory.tensor(TensorSeries::Cells).unwrap()[0][0][0];
    let b = run_2010.trajectory.tensor(TensorSeries::Cells).unwrap()[0][0][0];
    assert!(a != b);
    assert!((a - b).abs() < 1e-6);
}
