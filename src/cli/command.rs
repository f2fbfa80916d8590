use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::{error::Error, path::Path};

use rufs::fs::{
    compute_layout, BlockGroupDescriptor, BuildProgress, CheckReport, FsError, ImageBuilder,
    ImageReader, Inode, LayoutParams, SuperBlock,
};

use crate::cli::{Command, InspectArgs, MkfsArgs};

pub fn execute_command(cmd: &Command) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Mkfs(args) => mkfs(args),
        Command::Inspect(args) => inspect(args),
    }
}

fn mkfs(args: &MkfsArgs) -> Result<(), Box<dyn Error>> {
    let cfg = args.resolve()?;
    // 参数不合法时在碰文件之前就报错
    let layout = compute_layout(cfg.image_size_bytes()?, cfg.block_size, cfg.inode_ratio)?;

    if args.path.exists() && !args.force && !confirm_overwrite(&args.path)? {
        println!("{}", "Aborted, nothing was written.".yellow());
        return Ok(());
    }

    println!("💾 Formatting {}...", args.path.display().to_string().cyan());
    let pb = ProgressBar::new(layout.num_groups);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.green/black}] {pos:>3}/{len} groups {msg}")?
            .progress_chars("#>-"),
    );

    let builder = ImageBuilder::new(layout).with_root_dir(cfg.root_dir);
    let result = builder.build(&args.path, |event| match event {
        BuildProgress::Step(step) => pb.set_message(step),
        BuildProgress::Group { index, .. } => pb.set_position(index + 1),
    });

    let sb = match result {
        Ok(sb) => sb,
        Err(e) => {
            pb.abandon_with_message("failed");
            // 写到一半的镜像不能用，直接删掉
            if matches!(e, FsError::IoFailure(_)) {
                let _ = std::fs::remove_file(&args.path);
            }
            return Err(e.into());
        }
    };
    pb.finish_with_message("✅ done");

    print_layout(builder.layout(), &sb);
    if cfg.root_dir {
        println!("{} {}", "Root directory:".blue(), "inode 1".green());
    }
    Ok(())
}

fn confirm_overwrite(path: &Path) -> Result<bool, Box<dyn Error>> {
    let answer = Confirm::new()
        .with_prompt(format!("{} already exists. Overwrite it?", path.display()))
        .default(false)
        .interact()?;
    Ok(answer)
}

fn print_layout(layout: &LayoutParams, sb: &SuperBlock) {
    println!("{}", "📊 Filesystem layout".bright_yellow().bold());
    println!(
        "{}: {} × {} bytes (log_block_size {})",
        "Blocks".blue(),
        layout.num_blocks,
        layout.block_size,
        layout.log_block_size
    );
    println!(
        "{}: {} ({} per group, {} table blocks each)",
        "Inodes".blue(),
        layout.inode_slots(),
        layout.inodes_per_group,
        layout.inode_table_blocks
    );
    println!(
        "{}: {} of {} blocks",
        "Groups".blue(),
        layout.num_groups,
        layout.blocks_per_group
    );
    println!(
        "{}: {} (superblock + {} descriptor table)",
        "Reserved blocks".blue(),
        layout.reserved_blocks,
        layout.descriptor_table_blocks
    );
    println!(
        "{}: {} blocks, {} inodes",
        "Free".blue(),
        sb.num_free_blocks.to_string().green(),
        sb.num_free_inodes.to_string().green()
    );
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    superblock: &'a SuperBlock,
    block_size: u64,
    descriptors: &'a [BlockGroupDescriptor],
    #[serde(skip_serializing_if = "Option::is_none")]
    inode: Option<&'a Inode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    entries: Vec<String>,
    check: &'a CheckReport,
}

fn inspect(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let reader = ImageReader::open(&args.path)?;
    let sb = reader.superblock();
    let descs = reader.descriptors()?;
    let inode = args.inode.map(|i| reader.inode(i)).transpose()?;
    let entries = match &inode {
        Some(inode) => reader
            .dir_entries(inode)?
            .iter()
            .map(|e| format!("{} -> {}", e.name(), e.inode))
            .collect(),
        None => Vec::new(),
    };
    let report = reader.check()?;

    if args.json {
        let output = InspectOutput {
            superblock: sb,
            block_size: reader.block_size(),
            descriptors: &descs,
            inode: inode.as_ref(),
            entries,
            check: &report,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "📘 Superblock".bright_cyan().bold());
    println!(
        "  blocks {} (free {}), inodes {} (free {}), block size {}",
        sb.num_blocks, sb.num_free_blocks, sb.num_inodes, sb.num_free_inodes,
        reader.block_size()
    );
    println!(
        "  {} blocks / {} inodes per group, {} reserved, state {:?}",
        sb.blocks_per_group, sb.inodes_per_group, sb.blocks_reserved, sb.state
    );

    println!("{}", "📁 Block groups".bright_cyan().bold());
    for (g, desc) in descs.iter().enumerate() {
        println!(
            "  #{:<4} bitmap {:>8}  inode bitmap {:>8}  inode table {:>8}  free {} blocks / {} inodes, {} dirs",
            g,
            desc.block_bitmap,
            desc.inode_bitmap,
            desc.inode_table,
            desc.free_blocks,
            desc.free_inodes,
            desc.num_dirs
        );
    }

    if let (Some(index), Some(inode)) = (args.inode, &inode) {
        println!("{}", format!("📄 Inode {}", index).bright_cyan().bold());
        if !inode.is_used() {
            println!("  {}", "(unused)".bright_black());
        }
        println!(
            "  type {:?}, size {} bytes, {} links, {} blocks {:?}",
            inode.file_type,
            inode.size,
            inode.link_count,
            inode.block_count(),
            inode.block_ptrs.iter().filter(|&&b| b != 0).collect::<Vec<_>>()
        );
        for entry in &entries {
            println!("  {}", entry.bright_black());
        }
    }

    if report.is_clean() {
        println!("{}", "✅ Image is consistent".green());
    } else {
        for problem in &report.problems {
            println!("{} {}", "⚠️ ".yellow(), problem);
        }
        return Err(format!("{} consistency problem(s) found", report.problems.len()).into());
    }
    Ok(())
}
