extern crate bt_hwcfg as hwcfg;

use hwcfg::domain::settings::{PatchSettings, Settings};
use hwcfg::hci::opcode::{
    HCI_INTEL_MANUFACTURE, HCI_INTEL_MEMWRITE, HCI_INTEL_RDSW_VERSION, HCI_RESET,
};
use hwcfg::hci::Opcode;
use hwcfg::hwcfg::{HaltReason, HwCfgState, PatchActivation};
use hwcfg::infrastructure::loopback::LoopbackController;
use hwcfg::infrastructure::upio::RecordingUpio;
use hwcfg::{OpResult, VendorEvent, VendorLib};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

const VERSION: [u8; 9] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x11, 0x22, 0x33, 0x44];
const PATCH_NAME: &str = "aabbccddee11223344.seq";

type Vendor = VendorLib<LoopbackController, RecordingUpio>;

fn patch_dir(name: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bt_hwcfg_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    for (file, contents) in files {
        fs::write(dir.join(file), contents).unwrap();
    }
    dir
}

fn settings_for(dir: &Path, file_name: Option<&str>) -> Settings {
    Settings {
        patch: PatchSettings {
            patch_file_path: dir.to_string_lossy().into_owned(),
            patch_file_name: file_name.map(str::to_string),
            settlement_delay_ms: None,
        },
        ..Default::default()
    }
}

fn vendor(
    settings: &Settings,
    channel: LoopbackController,
) -> (Vendor, mpsc::UnboundedReceiver<VendorEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        VendorLib::new(channel, RecordingUpio::default(), settings, tx),
        rx,
    )
}

fn opcodes(vendor: &Vendor) -> Vec<Opcode> {
    vendor.channel().sent().iter().map(|c| c.opcode).collect()
}

fn firmware_outcomes(rx: &mut mpsc::UnboundedReceiver<VendorEvent>) -> Vec<OpResult> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            VendorEvent::FirmwareConfigured(result) => out.push(result),
            other => panic!("unexpected {:?}", other),
        }
    }
    out
}

#[test]
fn streams_patch_and_rechecks_version() {
    let dir = patch_dir(
        "stream",
        &[
            ("README", "not a patch"),
            (
                PATCH_NAME,
                "* header\n01 8EFC 0F000102030405060708090A0B0C0D0E\n\r\n01 8EFC 020102\n",
            ),
        ],
    );
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), LoopbackController::new(&VERSION));

    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(firmware_outcomes(&mut rx), vec![OpResult::Success]);
    assert_eq!(
        opcodes(&vendor),
        vec![
            HCI_RESET,
            HCI_INTEL_RDSW_VERSION,
            HCI_INTEL_MANUFACTURE,
            HCI_INTEL_MEMWRITE,
            HCI_INTEL_MEMWRITE,
            HCI_INTEL_MANUFACTURE,
            HCI_INTEL_RDSW_VERSION,
        ]
    );

    let sent = vendor.channel().sent();
    assert_eq!(sent[2].params, vec![0x01, 0x00]);
    assert_eq!(sent[3].params, (0x00..=0x0E).collect::<Vec<u8>>());
    assert_eq!(sent[4].params, vec![0x01, 0x02]);
    assert_eq!(sent[5].params, vec![0x00, 0x02]);

    let fw = vendor.firmware();
    assert_eq!(fw.chip_name(), "aabbccddee11223344");
    assert_eq!(fw.commands_sent(), 2);
    assert_eq!(fw.patch_activation(), PatchActivation::Enabled);
    assert_eq!(fw.state(), HwCfgState::Idle);
    assert!(!fw.has_open_patch_file());
    assert_eq!(vendor.firmware_halt(), None);
    assert_eq!(vendor.channel().outstanding(), 0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn patch_name_matches_case_insensitively() {
    let dir = patch_dir("case", &[("AABBCCDDEE11223344.SEQ", "01 8EFC 0100\n")]);
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), LoopbackController::new(&VERSION));

    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(firmware_outcomes(&mut rx), vec![OpResult::Success]);
    assert_eq!(vendor.firmware().commands_sent(), 1);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn empty_patch_file_still_succeeds() {
    let dir = patch_dir("empty", &[(PATCH_NAME, "* nothing to send\nFFFF\n")]);
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), LoopbackController::new(&VERSION));

    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(firmware_outcomes(&mut rx), vec![OpResult::Success]);
    assert_eq!(
        opcodes(&vendor),
        vec![HCI_RESET, HCI_INTEL_RDSW_VERSION, HCI_INTEL_MANUFACTURE, HCI_INTEL_MANUFACTURE]
    );
    assert_eq!(vendor.channel().sent()[3].params, vec![0x00, 0x00]);
    assert_eq!(vendor.firmware().patch_activation(), PatchActivation::NotSent);
    assert_eq!(vendor.channel().outstanding(), 0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn failed_record_aborts_once() {
    let dir = patch_dir(
        "abort",
        &[(PATCH_NAME, "01 8EFC 0100\n01 AAFC 0101\n01 8EFC 0102\n")],
    );
    let channel = LoopbackController::new(&VERSION).fail_opcode(Opcode(0xFCAA));
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), channel);

    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(firmware_outcomes(&mut rx), vec![OpResult::Fail]);
    // Nothing follows the failing record
    assert_eq!(opcodes(&vendor).last(), Some(&Opcode(0xFCAA)));
    assert_eq!(vendor.channel().sent().len(), 5);
    assert_eq!(vendor.firmware().state(), HwCfgState::Idle);
    assert!(!vendor.firmware().has_open_patch_file());
    assert_eq!(vendor.channel().outstanding(), 0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn failed_reset_aborts_before_version_read() {
    let channel = LoopbackController::new(&VERSION).fail_opcode(HCI_RESET);
    let (mut vendor, mut rx) = vendor(&settings_for(Path::new("/nonexistent"), None), channel);

    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(firmware_outcomes(&mut rx), vec![OpResult::Fail]);
    assert_eq!(opcodes(&vendor), vec![HCI_RESET]);
}

#[test]
fn rejected_transmit_fails_without_leaking() {
    let dir = patch_dir("reject", &[(PATCH_NAME, "01 8EFC 0100\n")]);
    let channel = LoopbackController::new(&VERSION).reject_opcode(HCI_INTEL_MEMWRITE);
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), channel);

    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(firmware_outcomes(&mut rx), vec![OpResult::Fail]);
    assert_eq!(
        opcodes(&vendor),
        vec![HCI_RESET, HCI_INTEL_RDSW_VERSION, HCI_INTEL_MANUFACTURE]
    );
    assert_eq!(vendor.channel().outstanding(), 0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn out_of_buffers_mid_sequence_fails() {
    let dir = patch_dir("nobuf", &[(PATCH_NAME, "01 8EFC 0100\n")]);
    let mut channel = LoopbackController::new(&VERSION);
    // reset, version read, then nothing
    channel.set_alloc_budget(Some(2));
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), channel);

    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(firmware_outcomes(&mut rx), vec![OpResult::Fail]);
    assert_eq!(opcodes(&vendor), vec![HCI_RESET, HCI_INTEL_RDSW_VERSION]);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn no_matching_patch_halts() {
    let dir = patch_dir("nomatch", &[("0011223344.seq", "01 8EFC 0100\n")]);
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), LoopbackController::new(&VERSION));

    vendor.start_firmware_config();
    vendor.pump();

    assert!(firmware_outcomes(&mut rx).is_empty());
    assert_eq!(vendor.firmware_halt(), Some(HaltReason::NoPatch));
    assert_eq!(opcodes(&vendor), vec![HCI_RESET, HCI_INTEL_RDSW_VERSION]);
    assert_eq!(vendor.channel().outstanding(), 0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn unreadable_override_halts() {
    let dir = patch_dir("unreadable", &[]);
    let settings = settings_for(&dir, Some("missing.seq"));
    let (mut vendor, mut rx) = vendor(&settings, LoopbackController::new(&VERSION));

    vendor.start_firmware_config();
    vendor.pump();

    assert!(firmware_outcomes(&mut rx).is_empty());
    assert_eq!(vendor.firmware_halt(), Some(HaltReason::PatchUnreadable));
    assert_eq!(vendor.channel().sent().len(), 2);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn override_name_skips_directory_scan() {
    let dir = patch_dir(
        "override",
        &[
            (PATCH_NAME, "01 8EFC 0100\n"),
            ("custom.bin", "01 8EFC 0100\n01 8EFC 0101\n01 8EFC 0102\n"),
        ],
    );
    let settings = settings_for(&dir, Some("custom.bin"));
    let (mut vendor, mut rx) = vendor(&settings, LoopbackController::new(&VERSION));

    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(firmware_outcomes(&mut rx), vec![OpResult::Success]);
    assert_eq!(vendor.firmware().commands_sent(), 3);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn restart_after_success_runs_again() {
    let dir = patch_dir("restart", &[(PATCH_NAME, "01 8EFC 0100\n")]);
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), LoopbackController::new(&VERSION));

    vendor.start_firmware_config();
    vendor.pump();
    vendor.channel_mut().take_sent();
    vendor.start_firmware_config();
    vendor.pump();

    assert_eq!(
        firmware_outcomes(&mut rx),
        vec![OpResult::Success, OpResult::Success]
    );
    assert_eq!(vendor.channel().sent().len(), 6);
    assert_eq!(vendor.firmware().commands_sent(), 1);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn second_start_while_running_is_refused() {
    let dir = patch_dir("busy", &[(PATCH_NAME, "01 8EFC 0100\n")]);
    let (mut vendor, mut rx) = vendor(&settings_for(&dir, None), LoopbackController::new(&VERSION));

    vendor.start_firmware_config();
    vendor.start_firmware_config();
    vendor.pump();

    // The refused request fails at once, the running one completes normally
    assert_eq!(
        firmware_outcomes(&mut rx),
        vec![OpResult::Fail, OpResult::Success]
    );
    assert_eq!(vendor.firmware().chip_name(), "aabbccddee11223344");
    assert_eq!(
        opcodes(&vendor).iter().filter(|&&op| op == HCI_RESET).count(),
        1
    );
    assert_eq!(vendor.channel().sent().len(), 6);
    assert_eq!(vendor.firmware_halt(), None);
    assert_eq!(vendor.channel().outstanding(), 0);

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn settlement_delay_follows_chip_or_override() {
    let dir = patch_dir("settle", &[]);
    let (vendor, _rx) = vendor(&settings_for(&dir, None), LoopbackController::new(&VERSION));
    assert_eq!(vendor.settlement_delay(), Duration::from_millis(100));

    let mut settings = settings_for(&dir, None);
    settings.patch.settlement_delay_ms = Some(0);
    let (tx, _rx) = mpsc::unbounded_channel();
    let vendor: Vendor = VendorLib::new(
        LoopbackController::new(&VERSION),
        RecordingUpio::default(),
        &settings,
        tx,
    );
    assert_eq!(vendor.settlement_delay(), Duration::ZERO);

    fs::remove_dir_all(dir).unwrap();
}
