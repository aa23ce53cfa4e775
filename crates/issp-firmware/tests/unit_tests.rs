//! Unit tests for the firmware crate's public API

mod image_tests {
    use issp_firmware::prelude::*;

    fn packed_image() -> Vec<u8> {
        let mut bytes = Vec::new();
        // 0x0000: 5 bytes, padded to 12
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x05]);
        bytes.extend_from_slice(&[0x10, 0x11, 0x12, 0x13, 0x14, 0x00]);
        // 0x0005: 2 bytes, exactly 8
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x05, 0x00, 0x02, 0x20, 0x21]);
        // terminator
        bytes.extend_from_slice(&[0x00; 6]);
        bytes
    }

    #[test]
    fn test_parse_packed_stream() -> Result<(), ImageError> {
        let image = FirmwareImage::parse(&packed_image())?;
        assert_eq!(image.records().len(), 2);
        assert_eq!(image.total_data_len(), 7);
        Ok(())
    }

    #[test]
    fn test_streaming_over_packed_stream() -> Result<(), ImageError> {
        let mut image = FirmwareImage::parse(&packed_image())?;
        let bytes: Vec<u8> = std::iter::from_fn(|| image.next_byte()).collect();
        assert_eq!(bytes, vec![0x10, 0x11, 0x12, 0x13, 0x14, 0x20, 0x21]);
        Ok(())
    }

    #[test]
    fn test_to_bytes_reproduces_input() -> Result<(), ImageError> {
        let input = packed_image();
        let image = FirmwareImage::parse(&input)?;
        assert_eq!(image.to_bytes(), input);
        Ok(())
    }

    #[test]
    fn test_trailing_bytes_after_terminator_ignored() -> Result<(), ImageError> {
        let mut input = packed_image();
        input.extend_from_slice(&[0xde, 0xad]);
        let image = FirmwareImage::parse(&input)?;
        assert_eq!(image.records().len(), 2);
        Ok(())
    }
}

mod validation_tests {
    use issp_firmware::prelude::*;

    fn psoc_like_image(version: u8) -> Result<FirmwareImage, ImageError> {
        // 128 blocks of 64 bytes, version byte near the top of flash
        let mut records = Vec::new();
        for block in 0u32..128 {
            let mut data = vec![0x30; 64];
            if block == 0x7f {
                data[0x02] = version;
            }
            records.push(FirmwareRecord::new(block * 64, data)?);
        }
        records.push(FirmwareRecord::new(DEFAULT_SECURITY_ADDRESS, vec![0x00; 32])?);
        records.push(FirmwareRecord::new(DEFAULT_CHECKSUM_ADDRESS, vec![0x5a, 0x3c])?);
        FirmwareImage::new(records)
    }

    #[test]
    fn test_validate_psoc_like_image() -> Result<(), Box<dyn std::error::Error>> {
        let layout = FirmwareLayout::new(64, 128, 0x1fc2);
        let image = psoc_like_image(0x21)?;
        let result = validate(&image, &layout)?;

        assert_eq!(result.device_version, 0x21);
        assert_eq!(result.checksum, 0x5a3c);
        assert_eq!(result.security_record.index(), 128);
        Ok(())
    }

    #[test]
    fn test_security_record_seek_after_validation() -> Result<(), Box<dyn std::error::Error>> {
        let layout = FirmwareLayout::new(64, 128, 0x1fc2);
        let mut image = psoc_like_image(0x01)?;
        let result = validate(&image, &layout)?;

        image.seek_security(result.security_record)?;
        let mut security = [0xffu8; 32];
        assert_eq!(image.fill(&mut security), 32);
        assert!(security.iter().all(|b| *b == 0));
        Ok(())
    }

    #[test]
    fn test_wrong_capacity_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let layout = FirmwareLayout::new(64, 256, 0x1fc2);
        let image = psoc_like_image(0x01)?;
        let err = validate(&image, &layout);
        assert!(matches!(err, Err(FirmwareError::InvalidImage { .. })));
        Ok(())
    }

    #[test]
    fn test_validation_result_serializes() -> Result<(), Box<dyn std::error::Error>> {
        let layout = FirmwareLayout::new(64, 128, 0x1fc2);
        let result = validate(&psoc_like_image(0x07)?, &layout)?;
        let json = serde_json::to_value(result)?;
        assert_eq!(json["checksum"], 0x5a3c);
        assert_eq!(json["device_version"], 7);
        Ok(())
    }
}

mod decision_tests {
    use issp_firmware::prelude::*;

    #[test]
    fn test_default_policy_never_downgrades() {
        let decision = decide(DeviceVersion::Known(0x09), 0x05, UpdatePolicy::default());
        assert!(!decision.update);
        assert_eq!(decision.reason, DecisionReason::UpToDate);
    }

    #[test]
    fn test_protected_block_always_updates() {
        for version in [0x00u8, 0x7f, 0xff] {
            let decision = decide(DeviceVersion::Protected, version, UpdatePolicy::default());
            assert!(decision.update);
        }
    }
}
