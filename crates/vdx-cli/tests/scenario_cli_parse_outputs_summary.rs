//! `vdx parse <file>` prints a JSON summary and grouped key-values for a raw
//! DEX document, with no database or network involved.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

const RAW_DEX: &str = "\
DXS*1234567890*VA*V1*1\n\
ST*001*0001\n\
PA1*10*150\n\
PA2*3*450\n\
VA1*123456*789\n\
CA17*0*25*4\n\
MA5*ERROR*EGS*dS\n\
MA5*DETECTED TEMPERATURE*355*F\n\
EA1*EGS*240102*0930\n\
G85*1234\n\
SE*39*0001\n\
DXE*1*1\n";

fn write_dex_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(RAW_DEX.as_bytes()).expect("write dex");
    file
}

#[test]
fn parse_prints_summary_and_groups() {
    let file = write_dex_file();

    Command::cargo_bin("vdx")
        .expect("binary built")
        .arg("parse")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_sales\": \"1234.56\""))
        .stdout(predicate::str::contains("\"total_vends\": \"789\""))
        .stdout(predicate::str::contains("\"error_codes\": \"EGS,dS\""))
        .stdout(predicate::str::contains("\"temperature\": \"3.6\""))
        .stdout(predicate::str::contains("ca17_tube_0_denomination"));
}

#[test]
fn parse_flat_includes_the_raw_map() {
    let file = write_dex_file();

    Command::cargo_bin("vdx")
        .expect("binary built")
        .arg("parse")
        .arg(file.path())
        .arg("--flat")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"flat\""))
        .stdout(predicate::str::contains("\"ea1_event_EGS_date\": \"240102\""));
}

#[test]
fn parse_missing_file_fails_with_context() {
    Command::cargo_bin("vdx")
        .expect("binary built")
        .arg("parse")
        .arg("/no/such/file.dex")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read DEX file"));
}
