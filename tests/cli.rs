//! End-to-end tests driving the admin tools as real processes.

use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

fn ds3(tool: &str) -> Command {
    let mut cmd = Command::cargo_bin("ds3").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd.arg(tool);
    cmd
}

fn image_path(dir: &TempDir) -> String {
    dir.path().join("test.img").to_str().unwrap().to_owned()
}

fn mkfs(img: &str) {
    ds3("ds3mkfs")
        .args([img, "32", "32"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn mkfs_then_bits_prints_layout_and_bitmaps() {
    let dir = TempDir::new().unwrap();
    let img = image_path(&dir);
    mkfs(&img);

    ds3("ds3bits").arg(&img).assert().success().stdout(
        "Super\n\
         inode_region_addr 3\n\
         inode_region_len 1\n\
         num_inodes 32\n\
         data_region_addr 4\n\
         data_region_len 32\n\
         num_data 32\n\
         \n\
         Inode bitmap\n\
         1 0 0 0 \n\
         \n\
         Data bitmap\n\
         1 0 0 0 \n",
    );
}

#[test]
fn ls_of_fresh_root_shows_dot_entries() {
    let dir = TempDir::new().unwrap();
    let img = image_path(&dir);
    mkfs(&img);

    ds3("ds3ls")
        .args([img.as_str(), "/"])
        .assert()
        .success()
        .stdout("0\t.\n0\t..\n");
}

#[test]
fn touch_mkdir_cp_cat_round_trip() {
    let dir = TempDir::new().unwrap();
    let img = image_path(&dir);
    mkfs(&img);

    ds3("ds3mkdir").args([img.as_str(), "0", "a"]).assert().success();
    ds3("ds3touch").args([img.as_str(), "1", "f"]).assert().success();

    let src = dir.path().join("src.txt");
    fs::write(&src, "hello from the host\n").unwrap();
    ds3("ds3cp")
        .args([img.as_str(), src.to_str().unwrap(), "2"])
        .assert()
        .success();

    // Root's data block is 4, directory `a` got 5, the file content got 6.
    ds3("ds3cat").args([img.as_str(), "2"]).assert().success().stdout(
        "File blocks\n6\n\nFile data\nhello from the host\n",
    );

    ds3("ds3ls")
        .args([img.as_str(), "/a"])
        .assert()
        .success()
        .stdout("1\t.\n0\t..\n2\tf\n");
    ds3("ds3ls")
        .args([img.as_str(), "/a/f"])
        .assert()
        .success()
        .stdout("2\tf\n");
}

#[test]
fn touch_is_idempotent_and_type_conflicts_fail() {
    let dir = TempDir::new().unwrap();
    let img = image_path(&dir);
    mkfs(&img);

    ds3("ds3touch").args([img.as_str(), "0", "f"]).assert().success();
    ds3("ds3touch").args([img.as_str(), "0", "f"]).assert().success();
    ds3("ds3ls")
        .args([img.as_str(), "/"])
        .assert()
        .success()
        .stdout("0\t.\n0\t..\n1\tf\n");

    ds3("ds3mkdir")
        .args([img.as_str(), "0", "f"])
        .assert()
        .failure()
        .code(1)
        .stderr("Error creating directory\n");
}

#[test]
fn rm_removes_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let img = image_path(&dir);
    mkfs(&img);

    ds3("ds3mkdir").args([img.as_str(), "0", "a"]).assert().success();
    ds3("ds3touch").args([img.as_str(), "1", "f"]).assert().success();

    // A non-empty directory cannot be removed.
    ds3("ds3rm")
        .args([img.as_str(), "0", "a"])
        .assert()
        .failure()
        .code(1)
        .stderr("Error removing entry\n");

    ds3("ds3rm").args([img.as_str(), "1", "f"]).assert().success();
    ds3("ds3rm").args([img.as_str(), "0", "a"]).assert().success();
    // Removing an already-missing entry still succeeds.
    ds3("ds3rm").args([img.as_str(), "0", "a"]).assert().success();

    ds3("ds3ls")
        .args([img.as_str(), "/"])
        .assert()
        .success()
        .stdout("0\t.\n0\t..\n");
}

#[test]
fn rm_of_reserved_names_fails() {
    let dir = TempDir::new().unwrap();
    let img = image_path(&dir);
    mkfs(&img);

    ds3("ds3rm")
        .args([img.as_str(), "0", "."])
        .assert()
        .failure()
        .stderr("Error removing entry\n");
    ds3("ds3rm")
        .args([img.as_str(), "0", ".."])
        .assert()
        .failure()
        .stderr("Error removing entry\n");
}

#[test]
fn cat_of_directory_fails() {
    let dir = TempDir::new().unwrap();
    let img = image_path(&dir);
    mkfs(&img);

    ds3("ds3cat")
        .args([img.as_str(), "0"])
        .assert()
        .failure()
        .code(1)
        .stderr("Error reading file\n");
}

#[test]
fn ls_of_missing_path_fails() {
    let dir = TempDir::new().unwrap();
    let img = image_path(&dir);
    mkfs(&img);

    ds3("ds3ls")
        .args([img.as_str(), "/nope"])
        .assert()
        .failure()
        .code(1)
        .stderr("Directory not found\n");
}

#[test]
fn usage_banner_echoes_tool_name() {
    ds3("ds3ls")
        .assert()
        .failure()
        .code(1)
        .stderr(predicates::str::contains("ds3ls: diskImageFile directory"));
    ds3("ds3touch")
        .assert()
        .failure()
        .code(1)
        .stderr(predicates::str::contains(
            "ds3touch: diskImageFile parentInode fileName",
        ));
}
