//! Main of all `ds3` administration commands.
//!
//! The tools are dispatched on the binary name, so hard links named
//! `ds3ls`, `ds3cat`, ... all run from this one executable. Invoked under
//! the multiplexer name itself, the tool name is taken from the first
//! argument instead (`ds3 ds3ls image /`).

mod ds3bits;
mod ds3cat;
mod ds3cp;
mod ds3ls;
mod ds3mkdir;
mod ds3mkfs;
mod ds3rm;
mod ds3touch;

use ufs::error;

fn main() {
    env_logger::init();
    let (bin, mut args) = ufs::args();
    let bin = if bin == "ds3" {
        args.next()
            .and_then(|s| s.into_string().ok())
            .unwrap_or_else(|| {
                error("ds3", "missing tool name");
            })
    } else {
        bin
    };
    match bin.as_str() {
        "ds3bits" => ds3bits::main(&bin, args),
        "ds3cat" => ds3cat::main(&bin, args),
        "ds3cp" => ds3cp::main(&bin, args),
        "ds3ls" => ds3ls::main(&bin, args),
        "ds3mkdir" => ds3mkdir::main(&bin, args),
        "ds3mkfs" => ds3mkfs::main(&bin, args),
        "ds3rm" => ds3rm::main(&bin, args),
        "ds3touch" => ds3touch::main(&bin, args),
        _ => error("ds3", "invalid binary name"),
    }
}
