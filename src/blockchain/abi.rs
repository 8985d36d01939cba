//! Contract bindings and well-known system addresses of the rollup.

use alloy::primitives::{address, Address};
use alloy::sol;

/// Base (gas) token contract on L2.
pub const L2_BASE_TOKEN_ADDRESS: Address = address!("000000000000000000000000000000000000800a");

/// L2 native token vault; the spender every bridged ERC-20 must approve.
pub const L2_NATIVE_TOKEN_VAULT_ADDRESS: Address =
    address!("0000000000000000000000000000000000010004");

/// System contract that emits L2 → L1 messages.
pub const L1_MESSENGER_ADDRESS: Address = address!("0000000000000000000000000000000000008008");

/// Gas per pubdata byte every L1 → L2 request must offer.
pub const REQUIRED_L1_TO_L2_GAS_PER_PUBDATA_LIMIT: u64 = 800;

sol! {
    /// Transaction enqueued on L2 by an L1 priority request.
    #[derive(Debug, Default, PartialEq, Eq)]
    struct L2CanonicalTransaction {
        uint256 txType;
        uint256 from;
        uint256 to;
        uint256 gasLimit;
        uint256 gasPerPubdataByteLimit;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        uint256 paymaster;
        uint256 nonce;
        uint256 value;
        uint256[4] reserved;
        bytes data;
        bytes signature;
        uint256[] factoryDeps;
        bytes paymasterInput;
        bytes reservedDynamic;
    }

    /// Emitted by the L1 diamond proxy for every deposit.
    #[derive(Debug)]
    event NewPriorityRequest(
        uint256 txId,
        bytes32 txHash,
        uint64 expirationTimestamp,
        L2CanonicalTransaction transaction,
        bytes[] factoryDeps
    );

    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    interface IL2NativeTokenVault {
        function assetId(address token) external view returns (bytes32);
        function originChainId(bytes32 assetId) external view returns (uint256);
    }

    interface IL2Bridge {
        function withdraw(address _l1Receiver, address _l2Token, uint256 _amount) external;
    }

    interface IL2BaseToken {
        function withdraw(address _l1Receiver) external payable;
    }

    interface IMailbox {
        function requestL2Transaction(
            address _contractL2,
            uint256 _l2Value,
            bytes _calldata,
            uint256 _l2GasLimit,
            uint256 _l2GasPerPubdataByteLimit,
            bytes[] _factoryDeps,
            address _refundRecipient
        ) external payable returns (bytes32 canonicalTxHash);
    }

    interface IL1ERC20Bridge {
        function deposit(
            address _l2Receiver,
            address _l1Token,
            uint256 _amount,
            uint256 _l2TxGasLimit,
            uint256 _l2TxGasPerPubdataByte,
            address _refundRecipient
        ) external payable returns (bytes32 l2TxHash);
    }

    interface IL1SharedBridge {
        function isWithdrawalFinalized(
            uint256 _chainId,
            uint256 _l2BatchNumber,
            uint256 _l2MessageIndex
        ) external view returns (bool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, U256};
    use alloy::sol_types::SolEvent;

    #[test]
    fn test_priority_request_roundtrip_through_log_data() {
        let tx_hash = B256::repeat_byte(0xab);
        let event = NewPriorityRequest {
            txId: U256::from(7),
            txHash: tx_hash,
            expirationTimestamp: 1_700_000_000,
            transaction: L2CanonicalTransaction::default(),
            factoryDeps: Vec::new(),
        };

        let data = event.encode_log_data();
        assert_eq!(data.topics()[0], NewPriorityRequest::SIGNATURE_HASH);

        let decoded = NewPriorityRequest::decode_log_data(&data).unwrap();
        assert_eq!(decoded.txHash, tx_hash);
    }

    #[test]
    fn test_system_addresses() {
        assert_eq!(
            L2_BASE_TOKEN_ADDRESS.to_string().to_lowercase(),
            "0x000000000000000000000000000000000000800a"
        );
        assert_ne!(L2_NATIVE_TOKEN_VAULT_ADDRESS, L1_MESSENGER_ADDRESS);
    }
}
