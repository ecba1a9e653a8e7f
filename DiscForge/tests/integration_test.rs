use discforge::directory::{DirectoryEntry, DirectoryTable, PARENT_NAME, RecordTimestamp, SELF_NAME};
use discforge::iso::layout::{CD_SYNC_PATTERN, PVD_MAGIC, PVD_SECTOR, RAW_SECTOR_SIZE, VOLUME_SPACE_SIZE, psp, psx};
use discforge::expand::relocated_sector;
use discforge::pack::{PackIndex, dump_from_image, member_path};
use discforge::prelude::*;
use discforge::sprites::read_location_table;
use pretty_assertions::assert_eq;
use std::fs::File;
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

const XA: [u8; 14] = [0, 0, 0, 0, 0x0D, 0x55, b'X', b'A', 0, 0, 0, 0, 0, 0];
const FILE_MIDDLE: [u8; 7] = [0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01];
const DIR_MIDDLE: [u8; 7] = [0x02, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01];

fn stamp() -> RecordTimestamp {
    RecordTimestamp {
        year: 1997,
        month: 10,
        day: 17,
        hour: 18,
        minute: 37,
        second: 21,
    }
}

fn file_entry(name: &str, sector: u32, size: u32) -> DirectoryEntry {
    DirectoryEntry::new(name, sector, size, stamp(), 36, FILE_MIDDLE, XA.to_vec())
}

fn dir_entry(name: &str, sector: u32) -> DirectoryEntry {
    DirectoryEntry::new(name, sector, 2048, stamp(), 36, DIR_MIDDLE, Vec::new())
}

fn fixed_timestamp() -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 31)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

// ==================== PSX ====================

const SP2_SOURCES: [&str; 15] = [
    "ARLI2.SP2;1",
    "BIBU2.SP2;1",
    "BOM2.SP2;1",
    "BEHI2.SP2;1",
    "DEMON2.SP2;1",
    "DORA22.SP2;1",
    "HYOU2.SP2;1",
    "IRON5.SP2;1",
    "IRON4.SP2;1",
    "IRON2.SP2;1",
    "IRON3.SP2;1",
    "MINOTA2.SP2;1",
    "MOL2.SP2;1",
    "TORI2.SP2;1",
    "URI2.SP2;1",
];

fn psx_sprite_sector(i: usize) -> u32 {
    2000 + i as u32 * 20
}

fn psx_sprite_bytes(i: usize) -> Vec<u8> {
    let size = 30_000 + i;
    (0..size).map(|b| ((b + i * 7) % 251) as u8).collect()
}

fn sp2_sector(k: usize) -> u32 {
    9000 + k as u32 * 16
}

/// Sparse image of default length with a PVD, a location table, sprite
/// payloads and a `BATTLE` directory.
fn build_psx_image(sources: &[&str]) -> File {
    let file = tempfile::tempfile().unwrap();
    file.set_len(psx::DEFAULT_IMAGE_LEN).unwrap();

    let mut raw = &file;
    let pvd = u64::from(PVD_SECTOR) * RAW_SECTOR_SIZE;
    raw.seek(SeekFrom::Start(pvd)).unwrap();
    raw.write_all(&CD_SYNC_PATTERN).unwrap();
    raw.seek(SeekFrom::Start(pvd + 24)).unwrap();
    raw.write_all(&PVD_MAGIC).unwrap();

    let mut image = DiscImage::open(file).unwrap();
    assert_eq!(image.platform(), Platform::Psx);
    image.apply_patches(&VOLUME_SPACE_SIZE.patches(psx::DEFAULT_SECTOR_COUNT)).unwrap();

    let mut table = SpriteLocationTable::decode(SpriteTableLayout::PSX, &[0u8; 154 * 8]).unwrap();
    for i in 0..table.len() {
        let bytes = psx_sprite_bytes(i);
        table.set(i, psx_sprite_sector(i), bytes.len() as u32).unwrap();
        image.apply_patch(&Patch::at_sector(psx_sprite_sector(i), bytes)).unwrap();
    }
    image.apply_patch(&psx::SPRITE_TABLE.patch(table.encode()).unwrap()).unwrap();

    let mut dir = DirectoryTable::new();
    dir.append(dir_entry(SELF_NAME, psx::BATTLE_DIR_SECTOR)).unwrap();
    dir.append(dir_entry(PARENT_NAME, 22)).unwrap();
    dir.append(file_entry("WEP.SPR;1", 3000, 4096)).unwrap();
    dir.append(file_entry("ZODIAC.BIN;1", 3010, 2048)).unwrap();
    dir.append(file_entry("RAMUZA.SPR;1", psx_sprite_sector(0), 30_000)).unwrap();
    dir.append(file_entry("KANZEN.SHP;1", 3020, 1024)).unwrap();
    for (k, name) in sources.iter().enumerate() {
        dir.append(file_entry(name, sp2_sector(k), 32768)).unwrap();
    }
    let raw = dir.serialize(psx::BATTLE_DIR_SECTORS).unwrap();
    image.apply_patch(&Patch::at_sector(psx::BATTLE_DIR_SECTOR, raw)).unwrap();
    image.flush().unwrap();

    image.into_inner()
}

#[test]
fn test_psx_expansion() {
    let mut image = DiscImage::open(build_psx_image(&SP2_SOURCES)).unwrap();
    assert!(!detect_expansion(&mut image).unwrap());

    let phases = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&phases);
    let options = ExpansionOptions::new()
        .with_timestamp(fixed_timestamp())
        .with_progress(move |p| seen.lock().unwrap().push(p.phase));

    let report = expand_image(&mut image, &options).unwrap();
    assert_eq!(report.platform, Platform::Psx);
    assert_eq!(report.relocated_assets, 154);
    assert_eq!(report.filler_sectors, 4928);
    assert_eq!(report.image_len, psx::EXPANDED_IMAGE_LEN);

    assert_eq!(image.len(), psx::EXPANDED_IMAGE_LEN);
    assert_eq!(image.sector_count(), 234_992);
    assert_eq!(image.volume_sector_count().unwrap(), psx::EXPANDED_SECTOR_COUNT);
    assert!(detect_expansion(&mut image).unwrap());

    let phases = phases.lock().unwrap().clone();
    assert!(phases.contains(&ExpansionPhase::WritingFiller));
    assert_eq!(phases.last(), Some(&ExpansionPhase::Complete));

    // every slot points at its own 64 KiB area and keeps the original size
    let table = read_location_table(&mut image).unwrap();
    for (i, slot) in table.iter().enumerate() {
        let expected = psx_sprite_bytes(i);
        assert_eq!(slot.sector, relocated_sector(i));
        assert_eq!(slot.size as usize, expected.len());

        let stored = image.read_file(slot.sector, 0, 65536).unwrap();
        assert_eq!(&stored[..expected.len()], expected.as_slice());
        assert!(stored[expected.len()..].iter().all(|&b| b == 0));
    }

    // filler headers survive the relocation writes
    let head = image.read_at(psx::FILLER_START, 24).unwrap();
    assert_eq!(&head[..12], &CD_SYNC_PATTERN);
    assert_eq!(&head[12..16], &[0x51, 0x09, 0x39, 0x02]);
    let last_of_slot = image.read_at(psx::FILLER_START + 31 * RAW_SECTOR_SIZE + 16, 8).unwrap();
    assert_eq!(last_of_slot, vec![0x00, 0x00, 0x89, 0x00, 0x00, 0x00, 0x89, 0x00]);

    let raw = image.read_sectors(psx::BATTLE_DIR_SECTOR, psx::BATTLE_DIR_SECTORS).unwrap();
    let dir = DirectoryTable::parse(&raw).unwrap();
    let names = dir.names();
    assert!(names.contains("WEP.SPR;1"));
    assert!(names.contains("KANZEN.SHP;1"));
    assert!(!names.contains("RAMUZA.SPR;1"));
    assert!(!names.contains("ARLI2.SP2;1"));
    assert_eq!(dir.len(), 2 + 3 + 154 + 15);

    let first = dir.get("00.SPR;1").unwrap();
    assert_eq!(first.sector, relocated_sector(0));
    assert_eq!(first.size, 65536);
    assert_eq!(first.extended_bytes, XA.to_vec());
    assert_eq!(first.timestamp, RecordTimestamp::from_datetime(&fixed_timestamp()));
    assert_eq!(dir.get("99.SPR;1").unwrap().sector, relocated_sector(0x99));

    let aux = dir.get("8C.SP2;1").unwrap();
    assert_eq!(aux.sector, sp2_sector(0));
    assert_eq!(aux.size, 32768);
    assert_eq!(dir.get("99_5.SP2;1").unwrap().sector, sp2_sector(10));

    // a second run refuses, the idempotent form does nothing
    let err = expand_image(&mut image, &options).unwrap_err();
    assert!(matches!(err, Error::AlreadyExpanded));
    assert!(ensure_expanded(&mut image, &options).unwrap().is_none());
    assert_eq!(image.len(), psx::EXPANDED_IMAGE_LEN);
}

/// Everything a PSX expansion writes: length, volume size, location table,
/// `BATTLE` directory and the first relocation slot.
fn psx_state(image: &mut DiscImage<File>) -> (u64, u32, SpriteLocationTable, Vec<u8>, Vec<u8>) {
    (
        image.len(),
        image.volume_sector_count().unwrap(),
        read_location_table(image).unwrap(),
        image.read_sectors(psx::BATTLE_DIR_SECTOR, psx::BATTLE_DIR_SECTORS).unwrap(),
        image.read_at(psx::FILLER_START, RAW_SECTOR_SIZE as usize).unwrap(),
    )
}

#[test]
fn test_psx_validation_failure_leaves_image_untouched() {
    // the last auxiliary source is missing from the directory
    let mut image = DiscImage::open(build_psx_image(&SP2_SOURCES[..14])).unwrap();
    let before = psx_state(&mut image);

    let err = expand_image(&mut image, &ExpansionOptions::new()).unwrap_err();
    assert!(matches!(err, Error::EntryNotFound { ref name } if name == "URI2.SP2;1"));
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(image.len(), psx::DEFAULT_IMAGE_LEN);
    assert_eq!(psx_state(&mut image), before);
}

#[test]
fn test_psx_oversized_sprite_is_refused() {
    let mut image = DiscImage::open(build_psx_image(&SP2_SOURCES)).unwrap();
    let mut table = read_location_table(&mut image).unwrap();
    table.set(3, psx_sprite_sector(3), 70_000).unwrap();
    image.apply_patch(&psx::SPRITE_TABLE.patch(table.encode()).unwrap()).unwrap();
    let before = psx_state(&mut image);

    let err = expand_image(&mut image, &ExpansionOptions::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::AssetTooLarge {
            index: 3,
            size: 70_000,
            capacity: 65536
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(psx_state(&mut image), before);
}

// ==================== PSP ====================

const ROOT_SECTOR: u32 = 18;
const PSP_GAME_SECTOR: u32 = 19;
const SYSDIR_SECTOR: u32 = 20;
const USRDIR_SECTOR: u32 = 21;
const BOOT_SECTOR: u32 = 32;
const EBOOT_SECTOR: u32 = 1648;
const EXE_LEN: u32 = 0x326000;
const PACK_SECTOR: u32 = 3264;

/// Sectors of each relocation member in the stock test pack.
const RELOCATION_MEMBER_SECTORS: u32 = 16;

/// Sector offset of every mapped member inside the pack, plus the pack length in sectors.
///
/// Relocation members are `relocation_sectors` long, every other member one sector.
fn pack_layout(relocation_sectors: u32) -> (Vec<(usize, u32)>, u32) {
    let mut at = 1;
    let mut members = Vec::new();
    for index in 3..psp::NUM_PACK_FILES - 1 {
        members.push((index, at));
        at += if psp::RELOCATION_MEMBERS.contains(&index) { relocation_sectors } else { 1 };
    }
    (members, at)
}

fn member_sector(members: &[(usize, u32)], member: usize) -> u32 {
    members.iter().find(|(index, _)| *index == member).map(|&(_, at)| PACK_SECTOR + at).unwrap()
}

/// Pack member backing sprite slot `i`.
fn slot_member(i: usize) -> usize {
    match i {
        0..136 => 78 + i,
        136..156 => 214 + (i - 136),
        _ => 746 + (i - 156),
    }
}

fn member_bytes(index: usize) -> Vec<u8> {
    let mut bytes = vec![(index % 251) as u8; 2048];
    bytes[..4].copy_from_slice(&(index as u32).to_le_bytes());
    bytes
}

fn put(data: &mut [u8], logical: u64, bytes: &[u8]) {
    let at = logical as usize;
    data[at..at + bytes.len()].copy_from_slice(bytes);
}

fn put_dir(data: &mut [u8], sector: u32, parent: u32, entries: Vec<DirectoryEntry>) {
    let mut at = u64::from(sector) * 2048;
    for e in [dir_entry(SELF_NAME, sector), dir_entry(PARENT_NAME, parent)].into_iter().chain(entries) {
        let record = e.encode().unwrap();
        put(data, at, &record);
        at += record.len() as u64;
    }
}

fn exe_offset(exe_sector: u32, offset: u32) -> u64 {
    u64::from(exe_sector) * 2048 + u64::from(offset)
}

fn build_psp_image() -> Vec<u8> {
    build_psp_image_with(RELOCATION_MEMBER_SECTORS)
}

fn build_psp_image_with(relocation_sectors: u32) -> Vec<u8> {
    let (members, pack_sectors) = pack_layout(relocation_sectors);
    let total_sectors = PACK_SECTOR + pack_sectors;
    let mut data = vec![0u8; total_sectors as usize * 2048];

    put(&mut data, u64::from(PVD_SECTOR) * 2048, &PVD_MAGIC);
    put(&mut data, u64::from(PVD_SECTOR) * 2048 + 156, &dir_entry(SELF_NAME, ROOT_SECTOR).encode().unwrap());
    put_dir(&mut data, ROOT_SECTOR, ROOT_SECTOR, vec![dir_entry("PSP_GAME", PSP_GAME_SECTOR)]);
    put_dir(
        &mut data,
        PSP_GAME_SECTOR,
        ROOT_SECTOR,
        vec![dir_entry("SYSDIR", SYSDIR_SECTOR), dir_entry("USRDIR", USRDIR_SECTOR)],
    );
    put_dir(
        &mut data,
        SYSDIR_SECTOR,
        PSP_GAME_SECTOR,
        vec![file_entry("BOOT.BIN;1", BOOT_SECTOR, EXE_LEN), file_entry("EBOOT.BIN;1", EBOOT_SECTOR, EXE_LEN)],
    );
    put_dir(
        &mut data,
        USRDIR_SECTOR,
        PSP_GAME_SECTOR,
        vec![file_entry("fftpack.bin;1", PACK_SECTOR, pack_sectors * 2048)],
    );

    let pack = u64::from(PACK_SECTOR) * 2048;
    put(&mut data, pack, &member_bytes(0));
    let mut map = vec![0u8; psp::SECTOR_MAP_LEN];
    for (k, &(index, at)) in members.iter().enumerate() {
        put(&mut data, pack + u64::from(at) * 2048, &member_bytes(index));
        map[k * 4..k * 4 + 4].copy_from_slice(&(PACK_SECTOR + at).to_le_bytes());
    }

    let mut table = SpriteLocationTable::decode(SpriteTableLayout::PSP, &vec![0u8; SpriteTableLayout::PSP.byte_len()]).unwrap();
    for i in 0..table.len() {
        table.set(i, member_sector(&members, slot_member(i)), 2048).unwrap();
    }
    let table = table.encode();

    for exe in [BOOT_SECTOR, EBOOT_SECTOR] {
        put(&mut data, exe_offset(exe, 0), b"\x7FELF");
        put(&mut data, exe_offset(exe, psp::SECTOR_MAP_OFFSET), &map);
        put(&mut data, exe_offset(exe, psp::SPRITE_TABLE_OFFSET), &table);
    }
    data
}

/// Point `slot` at `(sector, size)` in both executables' tables.
fn set_slot(data: &mut [u8], slot: usize, sector: u32, size: u32) {
    assert!(slot < SpriteTableLayout::PSP.primary_slots);
    let mut raw = [0u8; 8];
    raw[..4].copy_from_slice(&sector.to_le_bytes());
    raw[4..].copy_from_slice(&size.to_le_bytes());
    for exe in [BOOT_SECTOR, EBOOT_SECTOR] {
        put(data, exe_offset(exe, psp::SPRITE_TABLE_OFFSET) + slot as u64 * 8, &raw);
    }
}

/// Run an expansion that must fail, returning the error, the untouched
/// image bytes and whether the scratch parent was left empty.
fn expand_psp_expecting_error(data: Vec<u8>) -> (Error, Vec<u8>, bool) {
    let scratch = tempfile::tempdir().unwrap();
    let options = ExpansionOptions::new().with_work_dir(scratch.path());
    let mut image = DiscImage::open(Cursor::new(data)).unwrap();
    let err = expand_image(&mut image, &options).unwrap_err();
    let clean = std::fs::read_dir(scratch.path()).unwrap().next().is_none();
    (err, image.into_inner().into_inner(), clean)
}

#[test]
fn test_psp_expansion() {
    let data = build_psp_image();
    let original_len = data.len() as u64;
    let mut image = DiscImage::open(Cursor::new(data)).unwrap();
    assert_eq!(image.platform(), Platform::Psp);
    assert!(!detect_expansion(&mut image).unwrap());

    let scratch = tempfile::tempdir().unwrap();
    let options = ExpansionOptions::new().with_work_dir(scratch.path());
    let report = expand_image(&mut image, &options).unwrap();
    assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    assert_eq!(report.platform, Platform::Psp);
    assert_eq!(report.relocated_assets, 165);
    assert_eq!(report.filler_sectors, 0);
    assert_eq!(image.len(), original_len);
    assert!(detect_expansion(&mut image).unwrap());

    // both executables carry the same sector map and table
    let layout = SpriteTableLayout::PSP;
    let boot_table = image.read_file(BOOT_SECTOR, u64::from(psp::SPRITE_TABLE_OFFSET), layout.byte_len()).unwrap();
    let eboot_table = image.read_file(EBOOT_SECTOR, u64::from(psp::SPRITE_TABLE_OFFSET), layout.byte_len()).unwrap();
    assert_eq!(boot_table, eboot_table);
    let boot_map = image.read_file(BOOT_SECTOR, u64::from(psp::SECTOR_MAP_OFFSET), psp::SECTOR_MAP_LEN).unwrap();
    let eboot_map = image.read_file(EBOOT_SECTOR, u64::from(psp::SECTOR_MAP_OFFSET), psp::SECTOR_MAP_LEN).unwrap();
    assert_eq!(boot_map, eboot_map);

    let (_, pack_sectors) = pack_layout(RELOCATION_MEMBER_SECTORS);
    let index = PackIndex::from_sector_map(&boot_map, PACK_SECTOR, u64::from(pack_sectors) * 2048).unwrap();
    for member in psp::RETIRED_SPRITE_MEMBERS {
        assert_eq!(index.get(member).unwrap().len, 0);
    }

    let table = read_location_table(&mut image).unwrap();
    for (i, slot) in table.iter().enumerate() {
        assert_eq!(slot.size, 65536);
        let member = index.get(234 + i).unwrap();
        assert_eq!(u64::from(slot.sector - PACK_SECTOR) * 2048, member.offset);
        assert_eq!(member.len, 65536);

        let stored = image.read_file(slot.sector, 0, 65536).unwrap();
        assert_eq!(&stored[..2048], member_bytes(slot_member(i)).as_slice());
        assert!(stored[2048..].iter().all(|&b| b == 0));
    }

    // untouched members moved with the rest of the pack
    for kept in [3, 214, 3968] {
        let member = index.get(kept).unwrap();
        let bytes = image.read_file(PACK_SECTOR, member.offset, 2048).unwrap();
        assert_eq!(bytes, member_bytes(kept));
    }
    assert_eq!(image.read_file(PACK_SECTOR, 0, 2048).unwrap(), member_bytes(0));

    // the unused tail of the pack is zeroed
    let tail = image.read_file(PACK_SECTOR + pack_sectors - 1, 0, 2048).unwrap();
    assert!(tail.iter().all(|&b| b == 0));

    let err = expand_image(&mut image, &ExpansionOptions::new()).unwrap_err();
    assert!(matches!(err, Error::AlreadyExpanded));
}

#[test]
fn test_psp_encrypted_executable_is_refused() {
    let mut data = build_psp_image();
    put(&mut data, exe_offset(EBOOT_SECTOR, 0), b"~PSP");
    let original = data.clone();

    let mut image = DiscImage::open(Cursor::new(data)).unwrap();
    let err = expand_image(&mut image, &ExpansionOptions::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert_eq!(image.into_inner().into_inner(), original);
}

#[test]
fn test_psp_pack_over_capacity_is_refused_before_writing() {
    // one-sector relocation members leave no room for 64 KiB sprites
    let data = build_psp_image_with(1);
    let original = data.clone();

    let (err, after, clean) = expand_psp_expecting_error(data);
    let (_, pack_sectors) = pack_layout(1);
    match err {
        Error::PackCapacityExceeded { size, capacity } => {
            assert_eq!(capacity, u64::from(pack_sectors) * 2048);
            assert!(size > capacity);
        }
        other => panic!("expected PackCapacityExceeded, got {other:?}"),
    }
    assert!(after == original);
    assert!(clean);
}

#[test]
fn test_psp_slot_without_member_is_refused() {
    let mut data = build_psp_image();
    set_slot(&mut data, 5, 7, 2048);
    let original = data.clone();

    let (err, after, clean) = expand_psp_expecting_error(data);
    assert!(matches!(err, Error::UnmappedSector { slot: 5, sector: 7 }));
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(after == original);
    assert!(clean);
}

#[test]
fn test_psp_oversized_sprite_is_refused() {
    // relocation members of 40 sectors are larger than a 64 KiB slot
    let mut data = build_psp_image_with(40);
    let (members, _) = pack_layout(40);
    set_slot(&mut data, 0, member_sector(&members, 234), 2048);
    let original = data.clone();

    let (err, after, clean) = expand_psp_expecting_error(data);
    assert!(matches!(
        err,
        Error::AssetTooLarge {
            index: 0,
            size: 81920,
            capacity: 65536
        }
    ));
    assert!(after == original);
    assert!(clean);
}

#[test]
fn test_psp_pack_dump_and_merge() {
    let mut image = DiscImage::open(Cursor::new(build_psp_image())).unwrap();
    let temp = tempfile::tempdir().unwrap();
    let dump = temp.path().join("dump");
    let merged = temp.path().join("fftpack.bin");

    let index = dump_from_image(&mut image, &dump).unwrap();
    assert_eq!(index.len(), 1 + 3966);
    assert_eq!(std::fs::read(member_path(&dump, 100)).unwrap(), member_bytes(100));
    assert_eq!(std::fs::read(member_path(&dump, 300)).unwrap().len(), 16 * 2048);

    let rebuilt = merge_dumped_files(&dump, &merged).unwrap();
    assert_eq!(rebuilt, index);

    let (_, pack_sectors) = pack_layout(RELOCATION_MEMBER_SECTORS);
    let original = image.read_sectors(PACK_SECTOR, pack_sectors as usize).unwrap();
    assert_eq!(std::fs::read(&merged).unwrap(), original);
}

#[test]
fn test_unrecognized_stream() {
    let err = DiscImage::open(Cursor::new(vec![0u8; 40 * 2048])).err().unwrap();
    assert!(matches!(err, Error::UnrecognizedImage { .. }));
}
