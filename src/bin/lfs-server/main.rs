// @author:    olinex
// @time:      2023/12/08

// self mods
mod device;
mod logging;
mod protocol;

// use other mods
#[macro_use]
extern crate log;

use clap::{value_t, App, Arg};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;

// use self mods
use device::FileBlockDevice;
use linked_fs::configs::{
    DEFAULT_BLOCK_BYTE_SIZE, DEFAULT_CAPACITY_BLOCKS, DEFAULT_MAX_FILENAME_LENGTH,
    DEFAULT_MAX_FILES,
};
use linked_fs::{BlockDevice, FileSystemManager, FsConfig, SharedFileSystem};
use protocol::{handle_line, Reply};

/// Serve one client until it quits or the connection drops.
/// Errors of a command are reported to the client and never end the session,
/// bytes which are not valid UTF-8 are replaced rather than refused.
fn handle_client(stream: TcpStream, fs: Arc<SharedFileSystem>, max_filename_length: usize) {
    let peer = stream
        .peer_addr()
        .map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());
    let result = (|| -> io::Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buffer);
            debug!("{} >> {}", peer, line.trim_end());
            let reply = handle_line(fs.as_ref(), &line, max_filename_length);
            writeln!(writer, "{}", reply.text())?;
            writer.flush()?;
            if let Reply::Close(_) = reply {
                break;
            }
        }
        Ok(())
    })();
    match result {
        Ok(()) => info!("client {} disconnected", peer),
        Err(err) => warn!("client {} connection problem: {}", peer, err),
    }
}

fn serve(port: u16, fs: Arc<SharedFileSystem>, max_filename_length: usize) -> io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    info!("server started, listening on port {}", port);
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!("accept failed: {}", err);
                continue;
            }
        };
        let fs = Arc::clone(&fs);
        let name = stream
            .peer_addr()
            .map_or_else(|_| "client".to_string(), |addr| addr.to_string());
        info!("new client {}", name);
        thread::Builder::new()
            .name(name)
            .spawn(move || handle_client(stream, fs, max_filename_length))?;
    }
    Ok(())
}

pub fn main() {
    logging::init();
    let block_size = DEFAULT_BLOCK_BYTE_SIZE.to_string();
    let blocks = DEFAULT_CAPACITY_BLOCKS.to_string();
    let max_files = DEFAULT_MAX_FILES.to_string();
    let max_name = DEFAULT_MAX_FILENAME_LENGTH.to_string();
    let matches = App::new("lfs-server")
        .about("Serve a block chained file system stored in a single file")
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .takes_value(true)
                .default_value("12345")
                .help("TCP port to listen on"),
        )
        .arg(
            Arg::with_name("store")
                .short("s")
                .long("store")
                .takes_value(true)
                .default_value("filesystem.dat")
                .help("Backing file of the file system"),
        )
        .arg(
            Arg::with_name("block-size")
                .long("block-size")
                .takes_value(true)
                .default_value(&block_size)
                .help("Byte size of each block"),
        )
        .arg(
            Arg::with_name("blocks")
                .long("blocks")
                .takes_value(true)
                .default_value(&blocks)
                .help("Total count of blocks, metadata blocks included"),
        )
        .arg(
            Arg::with_name("max-files")
                .long("max-files")
                .takes_value(true)
                .default_value(&max_files)
                .help("Count of inode slots"),
        )
        .arg(
            Arg::with_name("max-name")
                .long("max-name")
                .takes_value(true)
                .default_value(&max_name)
                .help("Max byte length of a file name"),
        )
        .arg(
            Arg::with_name("format")
                .long("format")
                .help("Format the backing file even if it holds a file system"),
        )
        .get_matches();

    let port = value_t!(matches, "port", u16).unwrap_or_else(|e| e.exit());
    let config = FsConfig::new(
        value_t!(matches, "block-size", usize).unwrap_or_else(|e| e.exit()),
        value_t!(matches, "blocks", usize).unwrap_or_else(|e| e.exit()),
        value_t!(matches, "max-files", usize).unwrap_or_else(|e| e.exit()),
        value_t!(matches, "max-name", usize).unwrap_or_else(|e| e.exit()),
    );
    let store = Path::new(matches.value_of("store").unwrap_or("filesystem.dat"));

    let device: Arc<dyn BlockDevice> = match FileBlockDevice::open(store, config.store_byte_size())
    {
        Ok(device) => Arc::new(device),
        Err(err) => {
            error!("can't open backing file {}: {}", store.display(), err);
            std::process::exit(1);
        }
    };
    let manager = if matches.is_present("format") {
        FileSystemManager::format(&device, config)
    } else {
        FileSystemManager::open_or_format(&device, config)
    };
    let manager = match manager {
        Ok(manager) => manager,
        Err(err) => {
            error!("can't mount file system: {}", err);
            std::process::exit(1);
        }
    };
    let fs = Arc::new(SharedFileSystem::new(manager));
    if let Err(err) = serve(port, fs, config.max_filename_length) {
        error!("could not start server on port {}: {}", port, err);
        std::process::exit(1);
    }
}
