use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use oufs::*;

const USAGE: &str = "\
usage: oufs <command> [args]
  format                     create an empty volume on the disk image
  filez [path]               list a directory (default: current directory)
  mkdir <path>               create a directory
  rmdir <path>               remove an empty directory
  touch <path>               create an empty file if it does not exist
  create <path>              write stdin to a file, replacing its content
  append <path>              append stdin to a file
  more <path>                print a file
  remove <path>              remove a name of a file
  link <existing> <new>      add another name for a file
  inspect -master | -inode N | -inodee N | -dblock N | -raw N

environment: ZPWD (working directory, default /), ZDISK (disk image, default vdisk1)";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    report(run(&args, &Environment::from_env()))
}

/// One diagnostic line on stderr per failure, and the matching exit status.
fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", diagnostic(&e));
            ExitCode::FAILURE
        }
    }
}

fn diagnostic(e: &anyhow::Error) -> String {
    format!("oufs: {:#}", e)
}

fn run(args: &[String], env: &Environment) -> Result<()> {
    let Some((command, rest)) = args.split_first() else {
        bail!("missing command\n{}", USAGE);
    };
    let disk = Arc::new(
        FileDisk::open(&env.disk_path)
            .with_context(|| format!("cannot open disk image {}", env.disk_path.display()))?,
    );

    let result = if command == "format" {
        FileSystem::format(Arc::clone(&disk))
            .map(|_| ())
            .context("format failed")
    } else {
        let mut fs = FileSystem::mount(Arc::clone(&disk)).context("cannot mount volume")?;
        dispatch(&mut fs, &env.cwd, command, rest)
    };
    disk.close()?;
    result
}

fn dispatch(fs: &mut FileSystem<FileDisk>, cwd: &str, command: &str, args: &[String]) -> Result<()> {
    match (command, args) {
        ("filez", []) => print_listing(fs.list(cwd, ".")?),
        ("filez", [path]) => print_listing(fs.list(cwd, path).with_context(|| path.clone())?),
        ("mkdir", [path]) => {
            fs.mkdir(cwd, path).with_context(|| path.clone())?;
        }
        ("rmdir", [path]) => fs.rmdir(cwd, path).with_context(|| path.clone())?,
        ("touch", [path]) => {
            let handle = fs.open(cwd, path, OpenMode::Append).with_context(|| path.clone())?;
            fs.close(handle)?;
        }
        ("create", [path]) => write_stdin(fs, cwd, path, OpenMode::Write)?,
        ("append", [path]) => write_stdin(fs, cwd, path, OpenMode::Append)?,
        ("more", [path]) => {
            let mut handle = fs.open(cwd, path, OpenMode::Read).with_context(|| path.clone())?;
            let content = fs.read_to_end(&mut handle)?;
            fs.close(handle)?;
            io::stdout().write_all(&content)?;
        }
        ("remove", [path]) => fs.remove(cwd, path).with_context(|| path.clone())?,
        ("link", [existing, new]) => fs
            .link(cwd, existing, new)
            .with_context(|| format!("{} -> {}", existing, new))?,
        ("inspect", [flag]) if flag == "-master" => inspect_master(fs)?,
        ("inspect", [flag, index]) => {
            let index: usize = index.parse().with_context(|| format!("bad index {}", index))?;
            match flag.as_str() {
                "-inode" => inspect_inode(fs, index, false)?,
                "-inodee" => inspect_inode(fs, index, true)?,
                "-dblock" => inspect_dblock(fs, index)?,
                "-raw" => inspect_raw(fs, index)?,
                _ => bail!("unknown argument {}\n{}", flag, USAGE),
            }
        }
        _ => bail!("bad command line\n{}", USAGE),
    }
    Ok(())
}

fn print_listing(names: Vec<String>) {
    for name in names {
        println!("{}", name);
    }
}

fn write_stdin(fs: &mut FileSystem<FileDisk>, cwd: &str, path: &str, mode: OpenMode) -> Result<()> {
    let mut data = Vec::new();
    io::stdin().read_to_end(&mut data).context("cannot read stdin")?;
    let mut handle = fs.open(cwd, path, mode).with_context(|| path.to_string())?;
    fs.write(&mut handle, &data).with_context(|| path.to_string())?;
    fs.close(handle)?;
    Ok(())
}

fn inspect_master(fs: &FileSystem<FileDisk>) -> Result<()> {
    let master = fs.master()?;
    println!("Inode table:");
    for byte in master.inode_bitmap() {
        println!("{:02x}", byte);
    }
    println!("Block table:");
    for byte in master.block_bitmap() {
        println!("{:02x}", byte);
    }
    Ok(())
}

fn inspect_inode(fs: &FileSystem<FileDisk>, index: usize, extended: bool) -> Result<()> {
    if index >= N_INODES {
        bail!("inode index out of range ({})", index);
    }
    let inode = fs.inode(index as InodeRef)?;
    println!("Inode: {}", index);
    println!("Type: {}", inode.kind.as_char());
    if extended {
        println!("N references: {}", inode.n_references);
    }
    for (i, block) in inode.blocks.iter().enumerate() {
        println!("Block {}: {}", i, block.unwrap_or(UNALLOCATED_BLOCK));
    }
    println!("Size: {}", inode.size);
    Ok(())
}

fn inspect_dblock(fs: &FileSystem<FileDisk>, index: usize) -> Result<()> {
    let block_id = block_index(index)?;
    let dir = fs.directory(block_id)?;
    println!("Directory at block {}:", index);
    for (i, entry) in dir.live_entries() {
        if let Some(inode_ref) = entry.inode {
            println!("Entry {}: name=\"{}\", inode={}", i, entry.name, inode_ref);
        }
    }
    Ok(())
}

fn inspect_raw(fs: &FileSystem<FileDisk>, index: usize) -> Result<()> {
    let block = fs.raw_block(block_index(index)?)?;
    println!("Raw data at block {}:", index);
    for (i, byte) in block.iter().enumerate() {
        if byte.is_ascii_graphic() || *byte == b' ' {
            println!("{:3}: {:02x} {}", i, byte, *byte as char);
        } else {
            println!("{:3}: {:02x}", i, byte);
        }
    }
    Ok(())
}

fn block_index(index: usize) -> Result<BlockRef> {
    if index >= N_BLOCKS_IN_DISK {
        bail!("block index out of range ({})", index);
    }
    Ok(index as BlockRef)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    fn oufs(env: &Environment, args: &[&str]) -> Result<()> {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        run(&args, env)
    }

    fn env_in(dir: &TempDir, cwd: &str) -> Environment {
        Environment {
            cwd: cwd.to_string(),
            disk_path: dir.path().join("vdisk1"),
        }
    }

    fn mounted(env: &Environment) -> (Arc<FileDisk>, FileSystem<FileDisk>) {
        let disk = Arc::new(FileDisk::open(&env.disk_path).unwrap());
        let fs = FileSystem::mount(Arc::clone(&disk)).unwrap();
        (disk, fs)
    }

    #[test]
    fn test_commands() {
        let dir = TempDir::new().unwrap();
        let root = env_in(&dir, "/");
        oufs(&root, &["format"]).unwrap();
        oufs(&root, &["mkdir", "docs"]).unwrap();
        let docs = env_in(&dir, "/docs");
        oufs(&docs, &["touch", "notes"]).unwrap();
        oufs(&docs, &["touch", "notes"]).unwrap();
        oufs(&root, &["link", "docs/notes", "alias"]).unwrap();
        oufs(&docs, &["filez"]).unwrap();
        oufs(&root, &["filez", "docs"]).unwrap();
        oufs(&root, &["more", "alias"]).unwrap();
        oufs(&root, &["inspect", "-master"]).unwrap();
        oufs(&root, &["inspect", "-inodee", "2"]).unwrap();
        oufs(&root, &["inspect", "-dblock", "9"]).unwrap();
        oufs(&root, &["inspect", "-raw", "127"]).unwrap();

        let (disk, fs) = mounted(&root);
        assert_eq!(fs.list("/", "/").unwrap(), vec!["./", "../", "alias", "docs/"]);
        assert_eq!(fs.stat("/", "alias").unwrap().1.n_references, 2);
        disk.close().unwrap();

        oufs(&root, &["remove", "alias"]).unwrap();
        oufs(&docs, &["remove", "notes"]).unwrap();
        oufs(&root, &["rmdir", "docs"]).unwrap();
        let (disk, fs) = mounted(&root);
        assert_eq!(fs.list("/", "/").unwrap(), vec!["./", "../"]);
        assert_eq!(fs.master().unwrap(), MasterBlock::formatted());
        disk.close().unwrap();
    }

    #[test]
    fn test_failures_are_reported() {
        let dir = TempDir::new().unwrap();
        let env = env_in(&dir, "/");

        let e = oufs(&env, &["filez"]).unwrap_err();
        assert_eq!(
            diagnostic(&e),
            "oufs: cannot mount volume: device does not hold a formatted volume"
        );

        oufs(&env, &["format"]).unwrap();
        let e = oufs(&env, &["mkdir", "/missing/x"]).unwrap_err();
        assert_eq!(diagnostic(&e), "oufs: /missing/x: no such directory along the path");
        assert!(!diagnostic(&e).contains('\n'));

        let e = oufs(&env, &["rmdir", "/"]).unwrap_err();
        assert_eq!(e.downcast_ref::<Error>(), Some(&Error::InvalidName));
        let e = oufs(&env, &["inspect", "-inode", "56"]).unwrap_err();
        assert_eq!(diagnostic(&e), "oufs: inode index out of range (56)");
        assert!(diagnostic(&oufs(&env, &["frobnicate"]).unwrap_err()).starts_with("oufs: bad command line"));
        assert!(diagnostic(&oufs(&env, &[]).unwrap_err()).starts_with("oufs: missing command"));

        assert_eq!(report(oufs(&env, &["more", "nothing"])), ExitCode::FAILURE);
        assert_eq!(report(oufs(&env, &["filez", "/"])), ExitCode::SUCCESS);
    }

    #[test]
    fn test_disk_released_after_failure() {
        let dir = TempDir::new().unwrap();
        let env = env_in(&dir, "/");
        oufs(&env, &["format"]).unwrap();
        assert!(oufs(&env, &["mkdir", "/a/b"]).is_err());
        // A failed command still closes the image for the next one.
        oufs(&env, &["mkdir", "a"]).unwrap();
    }
}
