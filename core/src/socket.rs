//! Socket pool initialization

use wiz_hal::chip::SOCKET_COUNT;
use wiz_hal::ChipControl;

use crate::config::SocketPolicy;
use crate::fmt::Debug2Format;

/// Apply `policy` to every socket slot and enable socket interrupts.
///
/// Re-running it re-applies the same state. Register write failures are
/// logged and skipped.
pub fn init_pool<C: ChipControl>(chip: &mut C, policy: &SocketPolicy) {
    if let Err(e) = chip.enable_socket_interrupts(policy.enabled_sockets) {
        warn!("SIMR write failed: {}", Debug2Format(&e));
    }

    for socket in 0..SOCKET_COUNT as u8 {
        if let Err(e) = chip.set_socket_buffers(socket, policy.rx_kib, policy.tx_kib) {
            warn!("Socket {} buffer sizing failed: {}", socket, Debug2Format(&e));
        }
        if let Err(e) = chip.set_socket_interrupt_mask(socket, policy.interrupt_mask) {
            warn!("Socket {} interrupt mask failed: {}", socket, Debug2Format(&e));
        }
    }
    debug!("Socket pool ready ({} sockets)", SOCKET_COUNT);
}
