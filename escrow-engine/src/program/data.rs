use swap_core::Pubkey;
use tracing::debug;

use super::ProgramState;
use crate::{error::SwapError, ledger::TokenLedger, models::DataBuffer, EscrowResult};

/// Creates an empty claim data buffer owned by `signer`
pub fn process_init_data<L: TokenLedger>(state: &mut ProgramState<L>, signer: &Pubkey, address: Pubkey) -> EscrowResult<()> {
    if state.store.data_buffer(&address).is_some() {
        return Err(SwapError::AccountAlreadyInitialized);
    }
    state.store.insert_data_buffer(
        address,
        DataBuffer {
            owner: *signer,
            data: Vec::new(),
        },
    );
    debug!("Opened data buffer {} for {}", address, signer);
    Ok(())
}

/// Writes `bytes` at offset `start`, growing the buffer as needed.
/// Returns the new buffer length.
pub fn process_write_data<L: TokenLedger>(
    state: &mut ProgramState<L>,
    signer: &Pubkey,
    address: &Pubkey,
    start: usize,
    bytes: &[u8],
) -> EscrowResult<usize> {
    state.store.owned_data_buffer(address, signer)?;
    let buffer = state
        .store
        .data_buffer_mut(address)
        .ok_or(SwapError::AccountNotInitialized)?;

    if start > buffer.data.len() {
        return Err(SwapError::fault(format!(
            "write at {} past end of {}-byte buffer",
            start,
            buffer.data.len()
        )));
    }
    let end = start
        .checked_add(bytes.len())
        .ok_or_else(|| SwapError::fault("write range overflow"))?;
    if end > buffer.data.len() {
        buffer.data.resize(end, 0);
    }
    buffer.data[start..end].copy_from_slice(bytes);
    Ok(buffer.data.len())
}

/// Drops a buffer the signer no longer needs
pub fn process_close_data<L: TokenLedger>(state: &mut ProgramState<L>, signer: &Pubkey, address: &Pubkey) -> EscrowResult<()> {
    state.store.owned_data_buffer(address, signer)?;
    state.store.remove_data_buffer(address);
    debug!("Closed data buffer {}", address);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[test]
    fn buffer_is_written_in_chunks() {
        let mut fx = Fixture::new();
        let signer = fx.claimer;
        let address = Pubkey::from_label("chunks");

        process_init_data(&mut fx.state, &signer, address).unwrap();
        assert_eq!(
            process_init_data(&mut fx.state, &signer, address),
            Err(SwapError::AccountAlreadyInitialized)
        );

        assert_eq!(process_write_data(&mut fx.state, &signer, &address, 0, &[1, 2, 3]), Ok(3));
        assert_eq!(process_write_data(&mut fx.state, &signer, &address, 3, &[4, 5]), Ok(5));
        assert_eq!(process_write_data(&mut fx.state, &signer, &address, 1, &[9]), Ok(5));
        assert_eq!(fx.state.store.data_buffer(&address).unwrap().data, vec![1, 9, 3, 4, 5]);

        assert_eq!(
            process_write_data(&mut fx.state, &signer, &address, 7, &[0]),
            Err(SwapError::ProgramFault(
                "write at 7 past end of 5-byte buffer".to_string()
            ))
        );
    }

    #[test]
    fn only_owner_may_write_or_close() {
        let mut fx = Fixture::new();
        let owner = fx.claimer;
        let other = fx.offerer;
        let address = Pubkey::from_label("owned");
        process_init_data(&mut fx.state, &owner, address).unwrap();

        assert_eq!(
            process_write_data(&mut fx.state, &other, &address, 0, &[1]),
            Err(SwapError::InvalidUserData)
        );
        assert_eq!(
            process_close_data(&mut fx.state, &other, &address),
            Err(SwapError::InvalidUserData)
        );

        process_close_data(&mut fx.state, &owner, &address).unwrap();
        assert_eq!(
            process_write_data(&mut fx.state, &owner, &address, 0, &[1]),
            Err(SwapError::AccountNotInitialized)
        );
    }
}
