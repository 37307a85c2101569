//! One-shot HTTP server for transfers that stall, which mockito cannot stage
//! without blocking its shared worker pool.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

/// Accept one connection on a fresh port, consume the request head and hand
/// the stream to `respond`. Returns the base URL.
pub fn serve_once<F>(respond: F) -> String
where
    F: FnOnce(&mut TcpStream) -> io::Result<()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind stub server");
    let addr = listener.local_addr().expect("Stub server has no address");

    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            if read_request_head(&mut stream).is_ok() {
                let _ = respond(&mut stream);
            }
        }
    });

    format!("http://{addr}")
}

/// Response that starts only after `delay`.
pub fn delayed_response(delay: Duration, body: Vec<u8>) -> String {
    serve_once(move |stream| {
        thread::sleep(delay);
        write_head(stream, body.len())?;
        stream.write_all(&body)?;
        stream.flush()
    })
}

/// Response that sends `first` bytes of a `total`-byte body, then goes quiet
/// for `stall` before finishing.
pub fn stalled_body(total: usize, first: usize, stall: Duration) -> String {
    serve_once(move |stream| {
        write_head(stream, total)?;
        stream.write_all(&vec![0u8; first])?;
        stream.flush()?;
        thread::sleep(stall);
        stream.write_all(&vec![0u8; total - first])?;
        stream.flush()
    })
}

fn write_head(stream: &mut TcpStream, content_length: usize) -> io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: application/gzip\r\nContent-Length: {content_length}\r\nConnection: close\r\n\r\n"
    )
}

fn read_request_head(stream: &mut TcpStream) -> io::Result<()> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte)? == 0 {
            break;
        }
        head.push(byte[0]);
    }
    Ok(())
}
