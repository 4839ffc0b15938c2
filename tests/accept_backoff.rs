#![cfg(target_os = "linux")]
// rlimit calls
#![allow(unsafe_code)]

use std::{fs::File, io, time::Duration};

use amazon_vl::{Shutdown, Timeouts, serve};
use axum::{Router, routing::get};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream},
    sync::oneshot,
};

fn fd_limit() -> libc::rlimit {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
    assert_eq!(rc, 0, "{}", io::Error::last_os_error());
    limit
}

fn set_fd_limit(limit: libc::rlimit) {
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &limit) };
    assert_eq!(rc, 0, "{}", io::Error::last_os_error());
}

/// Open `/dev/null` until the process hits its descriptor limit
fn hoard_descriptors() -> Vec<File> {
    let mut files = Vec::new();
    loop {
        match File::open("/dev/null") {
            Ok(file) => files.push(file),
            Err(err) => {
                assert_eq!(err.raw_os_error(), Some(libc::EMFILE));
                return files;
            }
        }
    }
}

#[tokio::test]
async fn accept_survives_descriptor_exhaustion() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route("/", get(|| async { "ok" }));
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, router, Timeouts::default(), async {
        let _ = rx.await;
    }));
    tokio::task::yield_now().await;

    let original = fd_limit();
    set_fd_limit(libc::rlimit {
        rlim_cur: original.rlim_cur.min(256),
        rlim_max: original.rlim_max,
    });
    let mut hoard = hoard_descriptors();
    // exactly one descriptor left, taken by the client socket
    hoard.pop();
    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    // let the server hit EMFILE on accept before descriptors come back
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(hoard);
    set_fd_limit(original);

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.ends_with("ok"), "{response}");

    tx.send(()).unwrap();
    assert_eq!(server.await.unwrap().unwrap(), Shutdown::Graceful);
}
