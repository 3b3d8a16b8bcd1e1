//! Deterministic contract address derivation (CREATE and CREATE2).
//!
//! References to contracts that are not deployed yet are predicted with these while
//! signing.

use alloy_core::primitives::{Address, B256};

/// Compute the address of a contract created by `sender` with the given account nonce.
pub fn create_address(sender: Address, nonce: u64) -> Address {
    sender.create(nonce)
}

/// Compute the CREATE2 address for `sender`, `salt` and the contract `init_code`.
pub fn create2_address(sender: Address, salt: B256, init_code: &[u8]) -> Address {
    sender.create2_from_code(salt, init_code)
}

/// Apply [`create_address`] repeatedly, following a chain of nested CREATE nonces.
///
/// `create_chain(a, &[1, 3])` is the address of the contract deployed with nonce 3 by the
/// contract that `a` deployed with nonce 1.
pub fn create_chain(origin: Address, nonces: &[u64]) -> Address {
    nonces
        .iter()
        .fold(origin, |sender, nonce| create_address(sender, *nonce))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy_core::primitives::hex;
    use rand::Rng;

    use super::*;

    #[test]
    fn test_create_address_known_vectors() {
        let sender = Address::from_str("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();

        let expected = [
            "0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d",
            "0x343c43a37d37dff08ae8c4a11544c718abb4fcf8",
            "0xf778b86fa74e846c4f0a1fbd1335fe81c00a0c91",
            "0xfffd933a0bc612844eaf0c6fe3e5b8e9b6c1d19c",
        ];

        for (nonce, expected) in expected.iter().enumerate() {
            assert_eq!(
                create_address(sender, nonce as u64),
                Address::from_str(expected).unwrap(),
                "nonce {nonce}"
            );
        }
    }

    #[test]
    fn test_create_address_rlp_boundaries() {
        let sender = Address::from_str("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").unwrap();

        let cases: [(u64, &str); 10] = [
            (0, "0x8464135c8F25Da09e49BC8782676a84730C318bC"),
            (1, "0x71C95911E9a5D330f4D621842EC243EE1343292e"),
            (0x7f, "0x15E1268353F6F19D9de2722bD60eC1081b45D3a6"),
            (0x80, "0x9cD5998cd48385cb69AE7AaDdFaC83A5DA185FaA"),
            (0xff, "0x6641F123824EE3af635D9AaDcD4f2cDa1Fc738fD"),
            (0x100, "0xdF582304420A499372e6442043621914511426Fe"),
            (0xffff, "0x44c56dE5DDCdf72A13C13dAC446b77fb86e6A596"),
            (0x10000, "0x65F416F778a1A86a8BE19e29BAC7ef9032dAb630"),
            (0xffffff, "0xA022cd4deb62cF0269928Df3f378d50a18892bfd"),
            (0x1000000, "0xfafe61377970869dA5C77d293751634D7813A2cE"),
        ];

        for (nonce, expected) in cases {
            assert_eq!(
                create_address(sender, nonce).to_checksum(None),
                expected,
                "nonce {nonce:#x}"
            );
        }
    }

    #[test]
    fn test_create_address_large_nonces() {
        let sender = Address::from_str("0x0000000000000000000000000000000000c0ffee").unwrap();

        let cases: [(u64, &str); 3] = [
            (0xffff_ffff, "0x2C03b3f05E9Cc4E35770c92A8fCd2b6B56ebd6F7"),
            (0x1_0000_0000, "0x693853f458E5bb8f729eE5ECafb0a3dD5074aF04"),
            (u64::MAX, "0x1a03C2915435a841d78498F226a4Af8Fb6AD029F"),
        ];

        for (nonce, expected) in cases {
            assert_eq!(create_address(sender, nonce).to_checksum(None), expected);
        }
    }

    #[test]
    fn test_create2_address_eip1014_vectors() {
        let cases = [
            (
                "0x0000000000000000000000000000000000000000",
                "0x0000000000000000000000000000000000000000000000000000000000000000",
                "0x00",
                "0x4D1A2e2bB4F88F0250f26Ffff098B0b30B26BF38",
            ),
            (
                "0xdeadbeef00000000000000000000000000000000",
                "0x0000000000000000000000000000000000000000000000000000000000000000",
                "0x00",
                "0xB928f69Bb1D91Cd65274e3c79d8986362984fDA3",
            ),
            (
                "0x0000000000000000000000000000000000000000",
                "0x0000000000000000000000000000000000000000000000000000000000000000",
                "0xdeadbeef",
                "0x70f2b2914A2a4b783FaEFb75f459A580616Fcb5e",
            ),
            (
                "0x00000000000000000000000000000000deadbeef",
                "0x00000000000000000000000000000000000000000000000000000000cafebabe",
                "0xdeadbeef",
                "0x60f3f640a8508fC6a86d45DF051962668E1e8AC7",
            ),
            (
                "0x0000000000000000000000000000000000000000",
                "0x0000000000000000000000000000000000000000000000000000000000000000",
                "0x",
                "0xE33C0C7F7df4809055C3ebA6c09CFe4BaF1BD9e0",
            ),
        ];

        for (sender, salt, code, expected) in cases {
            let address = create2_address(
                Address::from_str(sender).unwrap(),
                B256::from_str(salt).unwrap(),
                &hex::decode(code).unwrap(),
            );
            assert_eq!(address.to_checksum(None), expected);
        }
    }

    #[test]
    fn test_create_chain() {
        let origin = Address::from_str("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();

        assert_eq!(create_chain(origin, &[]), origin);
        assert_eq!(
            create_chain(origin, &[1]),
            Address::from_str("0x343c43a37d37dff08ae8c4a11544c718abb4fcf8").unwrap()
        );
        assert_eq!(
            create_chain(origin, &[1, 3]),
            create_address(create_address(origin, 1), 3)
        );
    }

    #[test]
    fn test_create_chain_composes_random_paths() {
        let mut rng = rand::rng();

        for _ in 0..16 {
            let origin = Address::from(rng.random::<[u8; 20]>());
            let nonces: Vec<u64> = (0..rng.random_range(1..5))
                .map(|_| rng.random_range(0..0x20000))
                .collect();

            let (last, prefix) = nonces.split_last().unwrap();
            assert_eq!(
                create_chain(origin, &nonces),
                create_address(create_chain(origin, prefix), *last)
            );
        }
    }
}
