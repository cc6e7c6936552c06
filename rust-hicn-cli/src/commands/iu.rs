//! `iu` command: encode and decode MAP-Me control messages

use anyhow::{Context, Result};
use log::debug;
use rust_hicn_common::{
    message::{self, MapMeParams, MessageType},
    Prefix,
};

use crate::IuCommands;

pub fn handle_command(cmd: IuCommands) -> Result<()> {
    match cmd {
        IuCommands::Encode {
            prefix,
            seq,
            notification,
            ack,
        } => encode(&prefix, seq, notification, ack),
        IuCommands::Decode { hex } => decode(&hex),
    }
}

fn encode(prefix: &str, seq: u32, notification: bool, ack: bool) -> Result<()> {
    let prefix: Prefix = prefix
        .parse()
        .with_context(|| format!("Invalid prefix '{}'", prefix))?;
    let mut kind = if notification {
        MessageType::Notification
    } else {
        MessageType::Update
    };
    if ack {
        kind = kind.ack();
    }

    let packet = message::encode(&prefix, &MapMeParams { kind, seq });
    debug!("Encoded {} for {} ({} bytes)", kind, prefix, packet.len());
    println!("{}", hex::encode(&packet));
    Ok(())
}

fn decode(input: &str) -> Result<()> {
    let digits: String = input.split_whitespace().collect();
    let packet = hex::decode(digits).context("Invalid hex input")?;
    let (prefix, params) = message::decode(&packet).context("Invalid MAP-Me message")?;
    println!("{} {} seq {}", params.kind, prefix, params.seq);
    Ok(())
}
