//! HTTP path service mapping GET/PUT/DELETE onto filesystem operations.
//!
//! The HTTP server itself (socket loop, request parsing) is an external
//! collaborator; it hands over the method, the URL path below its mount
//! point and the raw body, and writes back whatever [`Response`] says. The
//! first path component is always the literal sentinel `ds3`; the remaining
//! components form the filesystem path.
//!
//! Worker threads all funnel through one mutex, taken for the full duration
//! of a request, so filesystem operations stay strictly serialized.

use log::info;
use std::sync::Mutex;

use crate::error::{FsResult, UfsError};
use crate::fs::{LocalFileSystem, validate_name};
use crate::layout::FileType;

/// The root directory's inode number.
const ROOT_INODE: u32 = 0;

/// The sentinel leading every request path.
const PATH_SENTINEL: &str = "ds3";

/// The request methods the service understands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Put,
    Delete,
}

/// A parsed request, as delivered by the HTTP server collaborator.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Vec<u8>,
}

/// The response handed back to the HTTP server collaborator.
#[derive(Debug, Eq, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    fn from_error(err: &UfsError) -> Self {
        let (status, text) = match err {
            UfsError::NotFound => (404, "Not Found"),
            e if e.is_validation() => (400, "Bad Request"),
            _ => (500, "Internal Server Error"),
        };
        Self {
            status,
            body: text.as_bytes().to_vec(),
        }
    }
}

/// Serves a filesystem over request paths.
pub struct DistributedFileSystemService {
    fs: Mutex<LocalFileSystem>,
}

impl DistributedFileSystemService {
    /// Wraps a mounted filesystem.
    pub fn new(fs: LocalFileSystem) -> Self {
        Self { fs: Mutex::new(fs) }
    }

    /// Handles one request and maps the outcome onto a status code.
    pub fn handle(&self, request: &Request) -> Response {
        let result = match request.method {
            Method::Get => self.get(&request.path),
            Method::Put => self.put(&request.path, &request.body),
            Method::Delete => self.del(&request.path),
        };
        let response = match result {
            Ok(body) => Response::ok(body),
            Err(err) => Response::from_error(&err),
        };
        info!(
            "{:?} {} -> {}",
            request.method, request.path, response.status
        );
        response
    }

    fn get(&self, path: &str) -> FsResult<Vec<u8>> {
        let components = path_components(path)?;
        let fs = self.fs.lock().unwrap();
        let inum = walk(&fs, &components)?;
        let node = fs.stat(inum)?;
        match node.file_type() {
            Some(FileType::Regular) => fs.read(inum, node.size as usize),
            Some(FileType::Directory) => list_directory(&fs, inum),
            None => Err(UfsError::InvalidInode),
        }
    }

    fn put(&self, path: &str, body: &[u8]) -> FsResult<Vec<u8>> {
        let components = path_components(path)?;
        let Some((name, dirs)) = components.split_last() else {
            return Err(UfsError::BadRequest);
        };
        let mut fs = self.fs.lock().unwrap();
        // Creation is idempotent, so existing intermediates pass through and
        // an intermediate of the wrong type fails the walk.
        let mut cur = ROOT_INODE;
        for dir in dirs {
            cur = fs.create(cur, FileType::Directory, dir)?;
        }
        let inum = fs.create(cur, FileType::Regular, name)?;
        fs.write(inum, body)?;
        Ok(Vec::new())
    }

    fn del(&self, path: &str) -> FsResult<Vec<u8>> {
        let components = path_components(path)?;
        let Some((name, dirs)) = components.split_last() else {
            // The sentinel root itself has no parent to unlink from.
            return Err(UfsError::UnlinkNotAllowed);
        };
        let mut fs = self.fs.lock().unwrap();
        let parent = walk(&fs, dirs)?;
        fs.unlink(parent, name)?;
        Ok(Vec::new())
    }
}

/// Splits a request path into filesystem path components, checking the
/// sentinel and applying the same name rules as `create`.
fn path_components(path: &str) -> FsResult<Vec<String>> {
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    if parts.next() != Some(PATH_SENTINEL) {
        return Err(UfsError::BadRequest);
    }
    let mut components = Vec::new();
    for part in parts {
        validate_name(part)?;
        components.push(part.to_owned());
    }
    Ok(components)
}

/// Resolves path components from the root. A missing entry and a walk
/// through a non-directory both read as "not found".
fn walk(fs: &LocalFileSystem, components: &[String]) -> FsResult<u32> {
    let mut cur = ROOT_INODE;
    for component in components {
        cur = match fs.lookup(cur, component) {
            Ok(inum) => inum,
            Err(UfsError::NotFound | UfsError::InvalidInode) => return Err(UfsError::NotFound),
            Err(err) => return Err(err),
        };
    }
    Ok(cur)
}

/// Renders a directory as one name per line, byte-wise sorted, directories
/// suffixed with `/`, with `.` and `..` left out.
fn list_directory(fs: &LocalFileSystem, inum: u32) -> FsResult<Vec<u8>> {
    let mut entries = fs.read_directory(inum)?;
    entries.retain(|e| e.name_bytes() != b"." && e.name_bytes() != b"..");
    entries.sort_by(|a, b| a.name_bytes().cmp(b.name_bytes()));
    let mut body = Vec::new();
    for entry in entries {
        let node = fs.stat(entry.inum)?;
        body.extend_from_slice(entry.name_bytes());
        if node.file_type() == Some(FileType::Directory) {
            body.push(b'/');
        }
        body.push(b'\n');
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::Disk;
    use crate::mkfs;
    use tempfile::NamedTempFile;

    fn service() -> (NamedTempFile, DistributedFileSystemService) {
        let file = NamedTempFile::new().unwrap();
        mkfs::format_image(file.path(), 32, 32).unwrap();
        let fs = LocalFileSystem::new(Disk::open(file.path()).unwrap()).unwrap();
        (file, DistributedFileSystemService::new(fs))
    }

    fn request(method: Method, path: &str, body: &[u8]) -> Request {
        Request {
            method,
            path: path.to_owned(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let (_file, service) = service();
        let put = service.handle(&request(Method::Put, "/ds3/a/f", b"hello"));
        assert_eq!(put.status, 200);

        let get = service.handle(&request(Method::Get, "/ds3/a/f", b""));
        assert_eq!(get.status, 200);
        assert_eq!(get.body, b"hello");
    }

    #[test]
    fn get_directory_lists_sorted_names() {
        let (_file, service) = service();
        service.handle(&request(Method::Put, "/ds3/a/f", b"hello"));
        service.handle(&request(Method::Put, "/ds3/a/b/g", b"x"));

        let list = service.handle(&request(Method::Get, "/ds3/a", b""));
        assert_eq!(list.status, 200);
        assert_eq!(list.body, b"b/\nf\n");

        // The sentinel alone resolves to the root directory.
        let root = service.handle(&request(Method::Get, "/ds3", b""));
        assert_eq!(root.status, 200);
        assert_eq!(root.body, b"a/\n");
    }

    #[test]
    fn get_missing_path_is_404() {
        let (_file, service) = service();
        let resp = service.handle(&request(Method::Get, "/ds3/nope", b""));
        assert_eq!(resp.status, 404);

        // Walking through a regular file is a 404 as well.
        service.handle(&request(Method::Put, "/ds3/f", b""));
        let resp = service.handle(&request(Method::Get, "/ds3/f/x", b""));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn bad_sentinel_is_400() {
        let (_file, service) = service();
        assert_eq!(service.handle(&request(Method::Get, "/other/a", b"")).status, 400);
        assert_eq!(service.handle(&request(Method::Get, "/", b"")).status, 400);
    }

    #[test]
    fn put_replaces_content() {
        let (_file, service) = service();
        service.handle(&request(Method::Put, "/ds3/f", b"first"));
        service.handle(&request(Method::Put, "/ds3/f", b"second"));
        let get = service.handle(&request(Method::Get, "/ds3/f", b""));
        assert_eq!(get.body, b"second");
    }

    #[test]
    fn put_over_directory_is_400() {
        let (_file, service) = service();
        service.handle(&request(Method::Put, "/ds3/a/f", b""));
        let resp = service.handle(&request(Method::Put, "/ds3/a", b"data"));
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn put_through_file_intermediate_is_400() {
        let (_file, service) = service();
        service.handle(&request(Method::Put, "/ds3/f", b""));
        let resp = service.handle(&request(Method::Put, "/ds3/f/g", b"data"));
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn delete_of_non_empty_directory_is_400() {
        let (_file, service) = service();
        service.handle(&request(Method::Put, "/ds3/a/f", b"hello"));
        let resp = service.handle(&request(Method::Delete, "/ds3/a", b""));
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn delete_then_get_is_404() {
        let (_file, service) = service();
        service.handle(&request(Method::Put, "/ds3/a/f", b"hello"));
        assert_eq!(
            service.handle(&request(Method::Delete, "/ds3/a/f", b"")).status,
            200
        );
        assert_eq!(
            service.handle(&request(Method::Get, "/ds3/a/f", b"")).status,
            404
        );
        assert_eq!(
            service.handle(&request(Method::Delete, "/ds3/a/f", b"")).status,
            404
        );
    }

    #[test]
    fn delete_of_sentinel_root_is_400() {
        let (_file, service) = service();
        let resp = service.handle(&request(Method::Delete, "/ds3", b""));
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn overlong_component_is_400() {
        let (_file, service) = service();
        let path = format!("/ds3/{}", "x".repeat(28));
        assert_eq!(service.handle(&request(Method::Get, &path, b"")).status, 400);
        assert_eq!(service.handle(&request(Method::Put, &path, b"")).status, 400);
    }
}
